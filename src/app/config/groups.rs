use crate::storage::{BatchSize, FilePersistenceConfig};
use crate::upload::{BatchProcessingLevel, DataUploadConfiguration, UploadFrequency};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Batch file tuning as written in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub batch_size: BatchSize,
    pub max_batch_size: u64,
    pub max_item_size: u64,
    pub max_items_per_batch: usize,
    #[serde(with = "super::serde_helpers::duration_ms")]
    pub old_file_threshold: Duration,
    pub max_disk_space: u64,
    #[serde(with = "super::serde_helpers::duration_ms")]
    pub cleanup_frequency: Duration,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        let defaults = FilePersistenceConfig::default();
        Self {
            batch_size: BatchSize::Medium,
            max_batch_size: defaults.max_batch_size,
            max_item_size: defaults.max_item_size,
            max_items_per_batch: defaults.max_items_per_batch,
            old_file_threshold: defaults.old_file_threshold,
            max_disk_space: defaults.max_disk_space,
            cleanup_frequency: defaults.cleanup_frequency,
        }
    }
}

impl From<&PersistenceConfig> for FilePersistenceConfig {
    fn from(config: &PersistenceConfig) -> Self {
        Self {
            recent_delay: config.batch_size.window_duration(),
            max_batch_size: config.max_batch_size,
            max_item_size: config.max_item_size,
            max_items_per_batch: config.max_items_per_batch,
            old_file_threshold: config.old_file_threshold,
            max_disk_space: config.max_disk_space,
            cleanup_frequency: config.cleanup_frequency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub frequency: UploadFrequency,
    pub batch_processing_level: BatchProcessingLevel,
}

impl From<&UploadConfig> for DataUploadConfiguration {
    fn from(config: &UploadConfig) -> Self {
        DataUploadConfiguration::new(config.frequency, config.batch_processing_level)
    }
}
