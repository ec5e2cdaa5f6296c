use super::status::UploadStatus;
use super::strategy::UploadSchedulerStrategy;
use super::uploader::DataUploader;
use crate::domain::{BatchData, LogLevel, LogTarget};
use crate::internal_logger::InternalLogger;
use crate::metrics::{PipelineMetrics, UploadQualityBlocker, UploadQualityEvent};
use crate::sdk::{ContextProvider, DatadogContext};
use crate::storage::Storage;
use crate::system::{NetworkInfoProvider, SystemInfoProvider};
use std::sync::Arc;
use std::time::Duration;

/// One upload pass of a feature: check the device, drain up to
/// `max_batches_per_job` batches, and compute when to run again.
pub struct UploadRunnable<S, U> {
    feature_name: String,
    storage: Arc<S>,
    uploader: Arc<U>,
    context_provider: Arc<dyn ContextProvider>,
    network_info_provider: Arc<dyn NetworkInfoProvider>,
    system_info_provider: Arc<dyn SystemInfoProvider>,
    strategy: Arc<dyn UploadSchedulerStrategy>,
    max_batches_per_job: usize,
    logger: Arc<dyn InternalLogger>,
    metrics: Arc<PipelineMetrics>,
}

pub struct UploadRunnableBuilder<S, U> {
    runnable: UploadRunnable<S, U>,
}

impl<S: Storage, U: DataUploader> UploadRunnableBuilder<S, U> {
    pub fn max_batches_per_job(mut self, max_batches_per_job: usize) -> Self {
        self.runnable.max_batches_per_job = max_batches_per_job;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn InternalLogger>) -> Self {
        self.runnable.logger = logger;
        self
    }

    pub fn metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.runnable.metrics = metrics;
        self
    }

    pub fn build(self) -> UploadRunnable<S, U> {
        self.runnable
    }
}

impl<S: Storage, U: DataUploader> UploadRunnable<S, U> {
    pub fn builder(
        feature_name: impl Into<String>,
        storage: Arc<S>,
        uploader: Arc<U>,
        context_provider: Arc<dyn ContextProvider>,
        network_info_provider: Arc<dyn NetworkInfoProvider>,
        system_info_provider: Arc<dyn SystemInfoProvider>,
        strategy: Arc<dyn UploadSchedulerStrategy>,
    ) -> UploadRunnableBuilder<S, U> {
        UploadRunnableBuilder {
            runnable: Self {
                feature_name: feature_name.into(),
                storage,
                uploader,
                context_provider,
                network_info_provider,
                system_info_provider,
                strategy,
                max_batches_per_job: 1,
                logger: Arc::new(crate::internal_logger::TracingLogger),
                metrics: Arc::new(PipelineMetrics::new()),
            },
        }
    }

    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    /// Runs one pass and returns the delay before the next one.
    pub async fn run(&self) -> Duration {
        let mut upload_attempts = 0;
        let mut last_status = None;

        if self.is_network_available() && self.is_system_ready() {
            let context = self.context_provider.context();
            for _ in 0..self.max_batches_per_job {
                let Some(batch) = self.storage.read_next_batch().await else {
                    break;
                };
                upload_attempts += 1;
                let status = self.consume_batch(&context, batch).await;
                let keep_going = status.is_success();
                last_status = Some(status);
                if !keep_going {
                    break;
                }
            }
        }

        self.metrics
            .record_upload_quality(UploadQualityEvent::count(&self.feature_name));
        self.strategy
            .next_delay(&self.feature_name, upload_attempts, last_status.as_ref())
    }

    async fn consume_batch(&self, context: &DatadogContext, batch: BatchData) -> UploadStatus {
        let status = self
            .uploader
            .upload(context, &batch.data, batch.metadata.as_deref())
            .await;
        status.log_status(
            &self.feature_name,
            batch.byte_size(),
            &*self.logger,
            Some(&batch.id),
        );

        if !status.is_success() {
            let specific_type = status
                .code()
                .map_or_else(|| status.name().to_string(), |code| code.to_string());
            self.metrics.record_upload_quality(UploadQualityEvent::failure(
                &self.feature_name,
                specific_type,
            ));
        }

        let delete_batch = !status.should_retry();
        self.metrics.record_upload(
            &self.feature_name,
            status.name(),
            status.is_success(),
            !delete_batch,
        );
        self.storage.confirm_batch_read(&batch.id, delete_batch).await;
        status
    }

    fn is_network_available(&self) -> bool {
        let available = self.network_info_provider.latest_network_info().is_connected();
        if !available {
            self.metrics.record_upload_quality(UploadQualityEvent::blocker(
                &self.feature_name,
                UploadQualityBlocker::Offline,
            ));
            self.logger.log_one(
                LogLevel::Debug,
                LogTarget::Maintainer,
                &format!("{}: no network, upload skipped", self.feature_name),
            );
        }
        available
    }

    fn is_system_ready(&self) -> bool {
        let info = self.system_info_provider.latest_system_info();
        let ready = info.allows_upload();
        if !info.has_enough_power() {
            self.metrics.record_upload_quality(UploadQualityEvent::blocker(
                &self.feature_name,
                UploadQualityBlocker::LowBattery,
            ));
        }
        if info.power_save_mode {
            self.metrics.record_upload_quality(UploadQualityEvent::blocker(
                &self.feature_name,
                UploadQualityBlocker::LowPowerMode,
            ));
        }
        if !ready {
            self.logger.log_one(
                LogLevel::Debug,
                LogTarget::Maintainer,
                &format!(
                    "{}: battery too low or power save mode on, upload skipped",
                    self.feature_name
                ),
            );
        }
        ready
    }
}
