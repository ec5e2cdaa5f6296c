//! Batch lifecycle and upload quality counters.
//!
//! Counts are always kept in process; with the `metrics` feature they are also
//! exported through a prometheus registry.

use parking_lot::Mutex;
#[cfg(feature = "metrics")]
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why a batch file left the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// Confirmed by the uploader, either delivered or dropped on a terminal status.
    Intake,
    /// Unreadable content.
    Invalid,
    /// Evicted to stay under the disk quota.
    Purged,
    /// Older than the retention threshold.
    Obsolete,
    /// Sent by a synchronous flush.
    Flushed,
    /// Wiped by `drop_all` or a consent change.
    Dropped,
}

impl RemovalReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            RemovalReason::Intake => "intake",
            RemovalReason::Invalid => "invalid",
            RemovalReason::Purged => "purged",
            RemovalReason::Obsolete => "obsolete",
            RemovalReason::Flushed => "flushed",
            RemovalReason::Dropped => "dropped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadQualityCategory {
    /// One per upload run, skipped or not.
    Count,
    /// An upload answered with anything but 202.
    Failure,
    /// A device condition that skipped the run.
    Blocker,
}

impl UploadQualityCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            UploadQualityCategory::Count => "count",
            UploadQualityCategory::Failure => "failure",
            UploadQualityCategory::Blocker => "blocker",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadQualityBlocker {
    Offline,
    LowBattery,
    LowPowerMode,
}

impl UploadQualityBlocker {
    pub const fn key(self) -> &'static str {
        match self {
            UploadQualityBlocker::Offline => "offline",
            UploadQualityBlocker::LowBattery => "low_battery",
            UploadQualityBlocker::LowPowerMode => "low_power_mode",
        }
    }
}

/// How well one feature's uploads go, keyed by feature (`track`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadQualityEvent {
    pub track: String,
    pub category: UploadQualityCategory,
    pub specific_type: Option<String>,
}

impl UploadQualityEvent {
    pub fn count(track: &str) -> Self {
        Self {
            track: track.to_string(),
            category: UploadQualityCategory::Count,
            specific_type: None,
        }
    }

    pub fn failure(track: &str, specific_type: impl Into<String>) -> Self {
        Self {
            track: track.to_string(),
            category: UploadQualityCategory::Failure,
            specific_type: Some(specific_type.into()),
        }
    }

    pub fn blocker(track: &str, blocker: UploadQualityBlocker) -> Self {
        Self {
            track: track.to_string(),
            category: UploadQualityCategory::Blocker,
            specific_type: Some(blocker.key().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_sent: u64,
    pub batches_retried: u64,
    pub batches_dropped: u64,
    pub batches_deleted: u64,
}

#[cfg(feature = "metrics")]
struct Exported {
    registry: Registry,
    upload_outcomes: IntCounterVec,
    batches_deleted: IntCounterVec,
    upload_quality: IntCounterVec,
}

#[derive(Default)]
pub struct PipelineMetrics {
    #[cfg(feature = "metrics")]
    exported: Option<Exported>,
    batches_sent: AtomicU64,
    batches_retried: AtomicU64,
    batches_dropped: AtomicU64,
    batches_deleted: AtomicU64,
    upload_quality: Mutex<HashMap<UploadQualityEvent, u64>>,
}

impl fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "metrics")]
            exported: Self::register().map_err(|e| {
                tracing::warn!("Prometheus metrics unavailable: {}", e);
            })
            .ok(),
            ..Self::default()
        }
    }

    #[cfg(feature = "metrics")]
    fn register() -> Result<Exported, prometheus::Error> {
        let registry = Registry::new();

        let upload_outcomes = IntCounterVec::new(
            Opts::new("dd_batch_uploads_total", "Batch upload attempts by outcome"),
            &["feature", "status"],
        )?;
        registry.register(Box::new(upload_outcomes.clone()))?;

        let batches_deleted = IntCounterVec::new(
            Opts::new("dd_batches_deleted_total", "Batch files deleted by reason"),
            &["feature", "reason"],
        )?;
        registry.register(Box::new(batches_deleted.clone()))?;

        let upload_quality = IntCounterVec::new(
            Opts::new("dd_upload_quality_total", "Upload runs, failures and blockers"),
            &["track", "category", "specific_type"],
        )?;
        registry.register(Box::new(upload_quality.clone()))?;

        Ok(Exported {
            registry,
            upload_outcomes,
            batches_deleted,
            upload_quality,
        })
    }

    /// Records one upload attempt. `status` is the outcome name, `retried` whether the
    /// batch stays on disk.
    pub fn record_upload(&self, feature: &str, status: &str, success: bool, retried: bool) {
        #[cfg(feature = "metrics")]
        if let Some(exported) = &self.exported {
            exported
                .upload_outcomes
                .with_label_values(&[feature, status])
                .inc();
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (feature, status);

        let counter = match (success, retried) {
            (true, _) => &self.batches_sent,
            (false, true) => &self.batches_retried,
            (false, false) => &self.batches_dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_batch_deleted(&self, feature: &str, reason: RemovalReason) {
        #[cfg(feature = "metrics")]
        if let Some(exported) = &self.exported {
            exported
                .batches_deleted
                .with_label_values(&[feature, reason.as_str()])
                .inc();
        }
        #[cfg(not(feature = "metrics"))]
        let _ = (feature, reason);

        self.batches_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upload_quality(&self, event: UploadQualityEvent) {
        #[cfg(feature = "metrics")]
        if let Some(exported) = &self.exported {
            exported
                .upload_quality
                .with_label_values(&[
                    event.track.as_str(),
                    event.category.as_str(),
                    event.specific_type.as_deref().unwrap_or(""),
                ])
                .inc();
        }

        *self.upload_quality.lock().entry(event).or_insert(0) += 1;
    }

    /// Every upload quality event seen so far, with its count.
    pub fn upload_quality(&self) -> HashMap<UploadQualityEvent, u64> {
        self.upload_quality.lock().clone()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_retried: self.batches_retried.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            batches_deleted: self.batches_deleted.load(Ordering::Relaxed),
        }
    }

    /// Prometheus text exposition of the exported counters.
    #[cfg(feature = "metrics")]
    pub fn export_text(&self) -> Option<String> {
        let exported = self.exported.as_ref()?;
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&exported.registry.gather(), &mut buffer)
            .ok()?;
        String::from_utf8(buffer).ok()
    }
}
