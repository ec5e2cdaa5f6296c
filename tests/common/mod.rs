#![allow(dead_code)]

use dd_upload_pipeline::domain::{
    BatchData, BatchId, LogLevel, LogTarget, RawBatchEvent, TrackingConsent,
};
use dd_upload_pipeline::internal_logger::InternalLogger;
use dd_upload_pipeline::metrics::PipelineMetrics;
use dd_upload_pipeline::sdk::{ContextProvider, DatadogContext};
use dd_upload_pipeline::storage::{ConsentAwareStorage, FilePersistenceConfig, Storage};
use dd_upload_pipeline::system::ManualTimeProvider;
use dd_upload_pipeline::upload::{DataUploader, UploadStatus};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

pub const START_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub targets: Vec<LogTarget>,
    pub message: String,
}

/// Keeps every internal log message for assertions.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .lock()
            .iter()
            .any(|r| r.level == level && r.message.contains(needle))
    }
}

impl InternalLogger for RecordingLogger {
    fn log(&self, level: LogLevel, targets: &[LogTarget], message: &str) {
        self.records.lock().push(LogRecord {
            level,
            targets: targets.to_vec(),
            message: message.to_string(),
        });
    }
}

pub struct StorageFixture {
    pub storage: Arc<ConsentAwareStorage>,
    pub clock: Arc<ManualTimeProvider>,
    pub logger: Arc<RecordingLogger>,
    pub metrics: Arc<PipelineMetrics>,
}

pub fn storage_fixture(
    root: &Path,
    consent: TrackingConsent,
    config: FilePersistenceConfig,
) -> StorageFixture {
    let clock = Arc::new(ManualTimeProvider::new(START_MS));
    let logger = Arc::new(RecordingLogger::default());
    let metrics = Arc::new(PipelineMetrics::new());
    let storage = Arc::new(ConsentAwareStorage::new(
        root,
        "logs",
        config,
        consent,
        clock.clone(),
        logger.clone(),
        metrics.clone(),
    ));
    StorageFixture {
        storage,
        clock,
        logger,
        metrics,
    }
}

/// In-memory store recording what the runnable asks of it.
#[derive(Default)]
pub struct FakeStorage {
    pub batches: Mutex<VecDeque<BatchData>>,
    pub reads: Mutex<usize>,
    pub confirmations: Mutex<Vec<(BatchId, bool)>>,
}

impl FakeStorage {
    pub fn with_batches(count: usize) -> Self {
        let storage = Self::default();
        for i in 0..count {
            storage.batches.lock().push_back(BatchData {
                id: BatchId::from_file(Path::new(&(1_000 + i).to_string())),
                data: vec![RawBatchEvent::from(format!("{{\"i\":{i}}}").as_str())],
                metadata: None,
            });
        }
        storage
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock()
    }

    pub fn confirmations(&self) -> Vec<(BatchId, bool)> {
        self.confirmations.lock().clone()
    }
}

impl Storage for FakeStorage {
    async fn read_next_batch(&self) -> Option<BatchData> {
        *self.reads.lock() += 1;
        self.batches.lock().pop_front()
    }

    async fn confirm_batch_read(&self, batch_id: &BatchId, delete_batch: bool) {
        self.confirmations
            .lock()
            .push((batch_id.clone(), delete_batch));
    }

    async fn drop_all(&self) {
        self.batches.lock().clear();
    }
}

/// Uploader answering with scripted statuses, then 202.
#[derive(Default)]
pub struct ScriptedUploader {
    statuses: Mutex<VecDeque<UploadStatus>>,
    calls: Mutex<usize>,
}

impl ScriptedUploader {
    pub fn answering(statuses: impl IntoIterator<Item = UploadStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into_iter().collect()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

impl DataUploader for ScriptedUploader {
    async fn upload(
        &self,
        _context: &DatadogContext,
        _batch: &[RawBatchEvent],
        _batch_metadata: Option<&[u8]>,
    ) -> UploadStatus {
        *self.calls.lock() += 1;
        self.statuses
            .lock()
            .pop_front()
            .unwrap_or(UploadStatus::Success { code: 202 })
    }
}

pub struct FixedContext;

impl ContextProvider for FixedContext {
    fn context(&self) -> DatadogContext {
        DatadogContext {
            client_token: "token".to_string(),
            source: "rust".to_string(),
            ..DatadogContext::default()
        }
    }
}
