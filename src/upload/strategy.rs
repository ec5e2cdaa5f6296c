use super::config::DataUploadConfiguration;
use super::status::UploadStatus;
use parking_lot::Mutex;
use std::time::Duration;

/// Fixed wait after a connectivity failure.
pub const NETWORK_ERROR_DELAY: Duration = Duration::from_secs(60);

const DECREASE_PERCENT: f64 = 0.90;
const INCREASE_PERCENT: f64 = 1.10;

/// Chooses the wait before the next upload run from the outcome of the last one.
pub trait UploadSchedulerStrategy: Send + Sync {
    /// `upload_attempts` is the number of batches sent during the run and
    /// `last_status` the outcome of the last of them.
    fn next_delay(
        &self,
        feature_name: &str,
        upload_attempts: usize,
        last_status: Option<&UploadStatus>,
    ) -> Duration;
}

/// Multiplicative back-off between `min_delay_ms` and `max_delay_ms`.
///
/// Holds the delay of a single scheduler; every feature gets its own instance.
#[derive(Debug)]
pub struct DefaultUploadSchedulerStrategy {
    min_delay_ms: u64,
    max_delay_ms: u64,
    current_delay_ms: Mutex<u64>,
}

impl DefaultUploadSchedulerStrategy {
    pub fn new(config: &DataUploadConfiguration) -> Self {
        Self {
            min_delay_ms: config.min_delay_ms(),
            max_delay_ms: config.max_delay_ms(),
            current_delay_ms: Mutex::new(config.default_delay_ms()),
        }
    }

    pub fn current_delay(&self) -> Duration {
        Duration::from_millis(*self.current_delay_ms.lock())
    }

    fn decrease(&self, previous: u64) -> u64 {
        ((previous as f64 * DECREASE_PERCENT).round() as u64).max(self.min_delay_ms)
    }

    fn increase(&self, previous: u64) -> u64 {
        ((previous as f64 * INCREASE_PERCENT).round() as u64).min(self.max_delay_ms)
    }
}

impl UploadSchedulerStrategy for DefaultUploadSchedulerStrategy {
    fn next_delay(
        &self,
        feature_name: &str,
        upload_attempts: usize,
        last_status: Option<&UploadStatus>,
    ) -> Duration {
        let mut current = self.current_delay_ms.lock();
        let previous = *current;
        *current = match last_status {
            Some(status) if upload_attempts > 0 && status.is_success() => self.decrease(previous),
            Some(status) if status.is_network_failure() => NETWORK_ERROR_DELAY.as_millis() as u64,
            _ => self.increase(previous),
        };
        tracing::debug!(
            feature = feature_name,
            upload_attempts,
            previous_ms = previous,
            next_ms = *current,
            "Next upload run scheduled"
        );
        Duration::from_millis(*current)
    }
}
