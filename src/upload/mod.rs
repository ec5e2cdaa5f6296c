//! Upload side of the pipeline: outcome classification, back-off, the periodic
//! upload loop, the shutdown flusher and the HTTP transport.

pub mod config;
pub mod dns;
pub mod flusher;
pub mod request;
pub mod runnable;
pub mod scheduler;
pub mod status;
pub mod strategy;
pub mod uploader;

pub use config::{BatchProcessingLevel, DataUploadConfiguration, UploadFrequency};
pub use dns::{DnsError, HostResolver, RotatingDnsResolver, SystemHostResolver};
pub use flusher::DataFlusher;
pub use request::{DatadogRequest, DefaultRequestFactory, PayloadDecoration, RequestError, RequestFactory};
pub use runnable::{UploadRunnable, UploadRunnableBuilder};
pub use scheduler::UploadScheduler;
pub use status::{UploadError, UploadOutcome, UploadStatus};
pub use strategy::{DefaultUploadSchedulerStrategy, NETWORK_ERROR_DELAY, UploadSchedulerStrategy};
pub use uploader::{ClientConfig, ClientError, DataUploader, HttpDataUploader};
