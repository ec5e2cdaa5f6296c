//! Persistent batch store.
//!
//! Producers append events to the open batch of a feature; the upload runnable
//! reads sealed batches one at a time and confirms each read, either deleting
//! the batch or releasing it for a later attempt.

pub mod codec;
pub mod config;
pub mod consent;
pub mod orchestrator;
pub mod store;
pub mod writer;

use crate::domain::{BatchData, BatchId};
use std::future::Future;

pub use codec::{BatchFileReaderWriter, CodecError, PlainFileReaderWriter};
pub use config::{BatchSize, FilePersistenceConfig};
pub use consent::ConsentMigration;
pub use orchestrator::BatchFileOrchestrator;
pub use store::ConsentAwareStorage;
pub use writer::BatchWriter;

/// Read side of a batch store, as seen by the upload runnable.
pub trait Storage: Send + Sync {
    /// Oldest sealed batch not already handed out, locked until confirmed.
    fn read_next_batch(&self) -> impl Future<Output = Option<BatchData>> + Send;

    /// Deletes the batch when `delete_batch`, otherwise makes it readable again.
    fn confirm_batch_read(
        &self,
        batch_id: &BatchId,
        delete_batch: bool,
    ) -> impl Future<Output = ()> + Send;

    /// Deletes every batch, locked or not.
    fn drop_all(&self) -> impl Future<Output = ()> + Send;
}
