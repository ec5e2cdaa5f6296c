use crate::domain::RawBatchEvent;
use crate::storage::{BatchWriter, ConsentAwareStorage};
use crate::upload::{DataFlusher, DataUploader, HttpDataUploader, UploadScheduler};
use std::sync::Arc;

/// Handle of one registered feature: where its producers write and what
/// uploads its batches.
pub struct FeatureScope<U = HttpDataUploader> {
    name: String,
    storage: Arc<ConsentAwareStorage>,
    uploader: Arc<U>,
    scheduler: UploadScheduler<ConsentAwareStorage, U>,
    flusher: DataFlusher,
}

impl<U: DataUploader + 'static> FeatureScope<U> {
    pub fn new(
        name: impl Into<String>,
        storage: Arc<ConsentAwareStorage>,
        uploader: Arc<U>,
        scheduler: UploadScheduler<ConsentAwareStorage, U>,
        flusher: DataFlusher,
    ) -> Self {
        Self {
            name: name.into(),
            storage,
            uploader,
            scheduler,
            flusher,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &Arc<ConsentAwareStorage> {
        &self.storage
    }

    /// Appends one event to the open batch. Never waits on the network.
    pub async fn write(&self, event: &RawBatchEvent, batch_metadata: Option<&[u8]>) -> bool {
        let mut writer = self.storage.write_current_batch(false).await;
        writer.write(event, batch_metadata).await
    }

    /// Opens a writer for producers that need the batch metadata or several appends.
    pub async fn write_current_batch(&self, force_new_batch: bool) -> BatchWriter<'_> {
        self.storage.write_current_batch(force_new_batch).await
    }

    pub fn start_uploads(&self) {
        self.scheduler.start();
    }

    pub fn stop_uploads(&self) {
        self.scheduler.stop();
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    pub fn is_uploading(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Sends every stored batch once and deletes it.
    pub async fn flush(&self) -> usize {
        self.flusher.flush(self.uploader.as_ref()).await
    }
}
