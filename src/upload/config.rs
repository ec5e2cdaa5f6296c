use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How eagerly a feature polls its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadFrequency {
    Frequent,
    #[default]
    Average,
    Rare,
}

impl UploadFrequency {
    pub fn base_step_ms(self) -> u64 {
        match self {
            UploadFrequency::Frequent => 500,
            UploadFrequency::Average => 2_000,
            UploadFrequency::Rare => 5_000,
        }
    }
}

/// How many batches one upload run may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchProcessingLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl BatchProcessingLevel {
    pub fn max_batches_per_upload_job(self) -> usize {
        match self {
            BatchProcessingLevel::Low => 1,
            BatchProcessingLevel::Medium => 10,
            BatchProcessingLevel::High => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUploadConfiguration {
    pub frequency: UploadFrequency,
    pub max_batches_per_upload_job: usize,
}

impl Default for DataUploadConfiguration {
    fn default() -> Self {
        Self::new(UploadFrequency::default(), BatchProcessingLevel::default())
    }
}

impl DataUploadConfiguration {
    pub fn new(frequency: UploadFrequency, level: BatchProcessingLevel) -> Self {
        Self {
            frequency,
            max_batches_per_upload_job: level.max_batches_per_upload_job(),
        }
    }

    pub fn min_delay_ms(&self) -> u64 {
        self.frequency.base_step_ms()
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.frequency.base_step_ms() * 10
    }

    pub fn default_delay_ms(&self) -> u64 {
        self.frequency.base_step_ms() * 5
    }

    pub fn default_delay(&self) -> Duration {
        Duration::from_millis(self.default_delay_ms())
    }
}
