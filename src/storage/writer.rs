use super::codec::{BatchFileReaderWriter, PlainFileReaderWriter};
use crate::domain::{BatchId, LogLevel, LogTarget, RawBatchEvent};
use crate::internal_logger::InternalLogger;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::sync::MutexGuard;

/// Scoped writer on the open batch of a store.
///
/// Holding a writer serializes it against every other writer of the same store;
/// drop it as soon as the events are appended.
pub struct BatchWriter<'a> {
    target: Option<WriteTarget>,
    max_item_size: u64,
    events: &'a BatchFileReaderWriter,
    metadata: &'a PlainFileReaderWriter,
    logger: &'a dyn InternalLogger,
    _guard: MutexGuard<'a, ()>,
}

struct WriteTarget {
    batch_file: PathBuf,
    metadata_file: PathBuf,
}

impl<'a> BatchWriter<'a> {
    pub(crate) fn new(
        target: Option<(PathBuf, PathBuf)>,
        max_item_size: u64,
        events: &'a BatchFileReaderWriter,
        metadata: &'a PlainFileReaderWriter,
        logger: &'a dyn InternalLogger,
        guard: MutexGuard<'a, ()>,
    ) -> Self {
        Self {
            target: target.map(|(batch_file, metadata_file)| WriteTarget {
                batch_file,
                metadata_file,
            }),
            max_item_size,
            events,
            metadata,
            logger,
            _guard: guard,
        }
    }

    /// The batch written to, `None` when writes are discarded.
    pub fn batch_id(&self) -> Option<BatchId> {
        self.target
            .as_ref()
            .map(|target| BatchId::from_file(&target.batch_file))
    }

    /// Metadata currently attached to the open batch.
    pub async fn current_metadata(&self) -> Option<Bytes> {
        let target = self.target.as_ref()?;
        if !tokio::fs::try_exists(&target.metadata_file).await.unwrap_or(false) {
            return None;
        }
        self.metadata.read_data(&target.metadata_file).await
    }

    /// Appends `event` to the batch, replacing the batch metadata when one is given.
    ///
    /// Empty events are accepted without touching the disk. Returns `false` when
    /// the event was not persisted.
    pub async fn write(&mut self, event: &RawBatchEvent, batch_metadata: Option<&[u8]>) -> bool {
        let Some(target) = self.target.as_ref() else {
            return false;
        };
        if event.is_empty() {
            return true;
        }
        if event.len() as u64 > self.max_item_size {
            self.logger.log_one(
                LogLevel::Error,
                LogTarget::User,
                &format!(
                    "Can't write data with size {} (max item size is {})",
                    event.len(),
                    self.max_item_size
                ),
            );
            return false;
        }

        let written = self.events.write_event(&target.batch_file, event).await;
        if written
            && let Some(metadata) = batch_metadata.filter(|m| !m.is_empty())
        {
            self.metadata
                .write_data(&target.metadata_file, metadata, false)
                .await;
        }
        written
    }
}
