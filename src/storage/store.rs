use super::Storage;
use super::codec::{BatchFileReaderWriter, PlainFileReaderWriter};
use super::config::FilePersistenceConfig;
use super::consent::{self, ConsentMigration};
use super::orchestrator::BatchFileOrchestrator;
use super::writer::BatchWriter;
use crate::domain::{BatchData, BatchId, LogLevel, LogTarget, TrackingConsent};
use crate::internal_logger::InternalLogger;
use crate::metrics::{PipelineMetrics, RemovalReason};
use crate::system::TimeProvider;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Batch store of one feature.
///
/// Events are routed by tracking consent: granted data goes to `<feature>-v2`,
/// pending data to `<feature>-pending-v2`, refused data is discarded. Only
/// granted batches are ever handed to readers.
pub struct ConsentAwareStorage {
    feature_name: String,
    granted: BatchFileOrchestrator,
    pending: BatchFileOrchestrator,
    consent: RwLock<TrackingConsent>,
    events: BatchFileReaderWriter,
    metadata: PlainFileReaderWriter,
    write_lock: tokio::sync::Mutex<()>,
    locked_batches: Mutex<HashSet<PathBuf>>,
    logger: Arc<dyn InternalLogger>,
}

impl ConsentAwareStorage {
    pub fn new(
        storage_root: &Path,
        feature_name: impl Into<String>,
        config: FilePersistenceConfig,
        consent: TrackingConsent,
        time_provider: Arc<dyn TimeProvider>,
        logger: Arc<dyn InternalLogger>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let feature_name = feature_name.into();
        let granted = BatchFileOrchestrator::new(
            storage_root.join(format!("{feature_name}-v2")),
            feature_name.clone(),
            config.clone(),
            time_provider.clone(),
            logger.clone(),
            metrics.clone(),
        );
        let pending = BatchFileOrchestrator::new(
            storage_root.join(format!("{feature_name}-pending-v2")),
            feature_name.clone(),
            config,
            time_provider,
            logger.clone(),
            metrics,
        );
        Self {
            feature_name,
            granted,
            pending,
            consent: RwLock::new(consent),
            events: BatchFileReaderWriter::new(logger.clone()),
            metadata: PlainFileReaderWriter::new(logger.clone()),
            write_lock: tokio::sync::Mutex::new(()),
            locked_batches: Mutex::new(HashSet::new()),
            logger,
        }
    }

    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    pub fn tracking_consent(&self) -> TrackingConsent {
        *self.consent.read()
    }

    pub fn granted_dir(&self) -> &Path {
        self.granted.root_dir()
    }

    pub fn pending_dir(&self) -> &Path {
        self.pending.root_dir()
    }

    /// Switches consent and migrates pending data accordingly.
    pub async fn set_tracking_consent(&self, consent: TrackingConsent) {
        let _guard = self.write_lock.lock().await;
        let previous = std::mem::replace(&mut *self.consent.write(), consent);
        match ConsentMigration::between(previous, consent) {
            ConsentMigration::MovePendingToGranted => {
                consent::move_pending_to_granted(&self.pending, &self.granted, &*self.logger)
                    .await;
            }
            ConsentMigration::WipePending => consent::wipe(&self.pending).await,
            ConsentMigration::Keep => {}
        }
    }

    /// Opens a writer on the current batch, or on a fresh one when `force_new_batch`.
    pub async fn write_current_batch(&self, force_new_batch: bool) -> BatchWriter<'_> {
        let guard = self.write_lock.lock().await;
        let orchestrator = match self.tracking_consent() {
            TrackingConsent::Granted => Some(&self.granted),
            TrackingConsent::Pending => Some(&self.pending),
            TrackingConsent::NotGranted => None,
        };
        let mut target = None;
        if let Some(orchestrator) = orchestrator
            && let Some(file) = orchestrator.get_writable_file(force_new_batch).await
        {
            let metadata_file = orchestrator.metadata_file(&file);
            target = Some((file, metadata_file));
        }
        BatchWriter::new(
            target,
            self.granted.config().max_item_size,
            &self.events,
            &self.metadata,
            &*self.logger,
            guard,
        )
    }

    /// Every uploadable batch file, locked or not.
    pub async fn flushable_files(&self) -> Vec<PathBuf> {
        self.granted.get_flushable_files().await
    }

    /// Reads a batch file without locking it.
    pub async fn read_batch_file(&self, file: &Path) -> BatchData {
        let data = self.events.read_events(file).await;
        let metadata_file = self.granted.metadata_file(file);
        let metadata = if tokio::fs::try_exists(&metadata_file).await.unwrap_or(false) {
            self.metadata.read_data(&metadata_file).await
        } else {
            None
        };
        BatchData {
            id: BatchId::from_file(file),
            data,
            metadata,
        }
    }

    pub async fn delete_batch_file(&self, file: &Path, reason: RemovalReason) -> bool {
        self.granted.delete_batch(file, reason).await
    }

    pub fn locked_batch_count(&self) -> usize {
        self.locked_batches.lock().len()
    }

    /// Picks the next readable file and locks it in one step.
    async fn lock_next_file(&self) -> Option<PathBuf> {
        loop {
            let excluded = self.locked_batches.lock().clone();
            let file = self.granted.get_readable_file(&excluded).await?;
            if self.locked_batches.lock().insert(file.clone()) {
                return Some(file);
            }
        }
    }

    fn unlock(&self, file: &Path) {
        self.locked_batches.lock().remove(file);
    }
}

impl Storage for ConsentAwareStorage {
    async fn read_next_batch(&self) -> Option<BatchData> {
        loop {
            let file = self.lock_next_file().await?;
            let batch = self.read_batch_file(&file).await;
            if !batch.data.is_empty() {
                return Some(batch);
            }

            self.logger.log(
                LogLevel::Error,
                &[LogTarget::Maintainer, LogTarget::Telemetry],
                &format!(
                    "Batch {} has no readable event and was deleted",
                    batch.id
                ),
            );
            self.granted.delete_batch(&file, RemovalReason::Invalid).await;
            self.unlock(&file);
        }
    }

    async fn confirm_batch_read(&self, batch_id: &BatchId, delete_batch: bool) {
        let file = self
            .locked_batches
            .lock()
            .iter()
            .find(|file| batch_id.matches_file(file))
            .cloned();
        let Some(file) = file else {
            self.logger.log_one(
                LogLevel::Warn,
                LogTarget::Maintainer,
                &format!("No locked batch matches id {batch_id}"),
            );
            return;
        };

        if delete_batch {
            self.granted.delete_batch(&file, RemovalReason::Intake).await;
        }
        self.unlock(&file);
    }

    async fn drop_all(&self) {
        let _guard = self.write_lock.lock().await;
        consent::wipe(&self.granted).await;
        consent::wipe(&self.pending).await;
        self.locked_batches.lock().clear();
    }
}
