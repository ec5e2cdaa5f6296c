use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// Tuning of the batch files of one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePersistenceConfig {
    /// How long a batch stays open for appends after its creation.
    pub recent_delay: Duration,
    pub max_batch_size: u64,
    pub max_item_size: u64,
    pub max_items_per_batch: usize,
    /// Batches older than this are deleted without being uploaded.
    pub old_file_threshold: Duration,
    pub max_disk_space: u64,
    pub cleanup_frequency: Duration,
}

impl Default for FilePersistenceConfig {
    fn default() -> Self {
        Self {
            recent_delay: BatchSize::Medium.window_duration(),
            max_batch_size: 4 * MIB,
            max_item_size: 512 * KIB,
            max_items_per_batch: 500,
            old_file_threshold: Duration::from_secs(18 * 60 * 60),
            max_disk_space: 128 * MIB,
            cleanup_frequency: Duration::from_secs(5),
        }
    }
}

impl FilePersistenceConfig {
    pub fn for_batch_size(batch_size: BatchSize) -> Self {
        Self {
            recent_delay: batch_size.window_duration(),
            ..Self::default()
        }
    }

    /// A file younger than this is still being written and is not handed to readers.
    pub fn recent_read_delay(&self) -> Duration {
        Duration::from_millis(self.recent_delay.as_millis() as u64 * 105 / 100)
    }

    /// A file older than this no longer accepts appends.
    pub fn recent_write_delay(&self) -> Duration {
        Duration::from_millis(self.recent_delay.as_millis() as u64 * 95 / 100)
    }
}

/// Preset for how long a batch collects events before it is sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl BatchSize {
    pub fn window_duration(self) -> Duration {
        match self {
            BatchSize::Small => Duration::from_millis(1_000),
            BatchSize::Medium => Duration::from_millis(5_000),
            BatchSize::Large => Duration::from_millis(10_000),
        }
    }
}
