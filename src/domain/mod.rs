//! Domain layer for the upload pipeline.
//!
//! Contains the canonical types shared across all modules:
//! - `RawBatchEvent`: one serialized event as written by a feature producer
//! - `BatchId` / `BatchData`: a batch handed out by the store for upload
//! - `TrackingConsent`: user consent gating where events are persisted
//! - `LogLevel` / `LogTarget`: severity and audience of internal log messages

pub mod batch;
pub mod consent;
pub mod log_level;
pub mod raw_batch_event;

pub use batch::{BatchData, BatchId};
pub use consent::TrackingConsent;
pub use log_level::{LogLevel, LogTarget};
pub use raw_batch_event::RawBatchEvent;
