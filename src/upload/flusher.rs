use super::uploader::DataUploader;
use crate::domain::{LogLevel, LogTarget};
use crate::internal_logger::InternalLogger;
use crate::metrics::RemovalReason;
use crate::sdk::ContextProvider;
use crate::storage::ConsentAwareStorage;
use std::sync::Arc;

/// Synchronous drain of a feature's store, used at shutdown.
///
/// Every batch is sent once and deleted whatever the outcome: there is no later
/// run to retry it.
pub struct DataFlusher {
    storage: Arc<ConsentAwareStorage>,
    context_provider: Arc<dyn ContextProvider>,
    logger: Arc<dyn InternalLogger>,
}

impl DataFlusher {
    pub fn new(
        storage: Arc<ConsentAwareStorage>,
        context_provider: Arc<dyn ContextProvider>,
        logger: Arc<dyn InternalLogger>,
    ) -> Self {
        Self {
            storage,
            context_provider,
            logger,
        }
    }

    /// Returns the number of batches sent. Batches without events are deleted unsent.
    pub async fn flush<U: DataUploader>(&self, uploader: &U) -> usize {
        let files = self.storage.flushable_files().await;
        if files.is_empty() {
            return 0;
        }

        let context = self.context_provider.context();
        let feature_name = self.storage.feature_name();
        let mut sent = 0;
        for file in &files {
            let batch = self.storage.read_batch_file(file).await;
            if batch.data.is_empty() {
                self.logger.log(
                    LogLevel::Error,
                    &[LogTarget::Maintainer, LogTarget::Telemetry],
                    &format!("Batch {} has no readable event and was deleted", batch.id),
                );
                self.storage
                    .delete_batch_file(file, RemovalReason::Invalid)
                    .await;
                continue;
            }
            let status = uploader
                .upload(&context, &batch.data, batch.metadata.as_deref())
                .await;
            status.log_status(feature_name, batch.byte_size(), &*self.logger, Some(&batch.id));
            self.storage
                .delete_batch_file(file, RemovalReason::Flushed)
                .await;
            sent += 1;
        }

        self.logger.log_one(
            LogLevel::Debug,
            LogTarget::Maintainer,
            &format!("{feature_name}: flushed {sent} of {} batches", files.len()),
        );
        sent
    }
}
