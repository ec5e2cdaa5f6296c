use super::context::{
    CONTEXT_WRITE_TIMEOUT, ContextProvider, DatadogContext, FeatureContextStore, SdkContextProvider,
};
use super::feature::FeatureScope;
use super::RegistryError;
use crate::domain::{LogLevel, LogTarget, TrackingConsent};
use crate::internal_logger::{InternalLogger, TracingLogger};
use crate::metrics::PipelineMetrics;
use crate::storage::{ConsentAwareStorage, FilePersistenceConfig, Storage};
use crate::system::{
    NetworkInfo, NetworkInfoProvider, StaticNetworkInfoProvider, StaticSystemInfoProvider,
    SystemInfo, SystemInfoProvider, SystemTimeProvider, TimeProvider,
};
use crate::upload::{
    ClientConfig, DataFlusher, DataUploadConfiguration, DefaultUploadSchedulerStrategy,
    HttpDataUploader, RequestFactory, UploadRunnable, UploadScheduler,
};
use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SdkCoreConfig {
    pub storage_dir: PathBuf,
    pub persistence: FilePersistenceConfig,
    pub upload: DataUploadConfiguration,
    pub client: ClientConfig,
    pub tracking_consent: TrackingConsent,
}

impl Default for SdkCoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: std::env::temp_dir().join("dd-upload-pipeline"),
            persistence: FilePersistenceConfig::default(),
            upload: DataUploadConfiguration::default(),
            client: ClientConfig::default(),
            tracking_consent: TrackingConsent::Granted,
        }
    }
}

/// What a feature brings when it registers: its name and how its batches
/// become requests.
pub struct FeatureConfig {
    pub name: String,
    pub request_factory: Arc<dyn RequestFactory>,
}

/// One pipeline instance: shared providers and the registered features.
pub struct SdkCore {
    config: SdkCoreConfig,
    context_provider: Arc<SdkContextProvider>,
    feature_contexts: Arc<FeatureContextStore>,
    network_info_provider: Arc<dyn NetworkInfoProvider>,
    system_info_provider: Arc<dyn SystemInfoProvider>,
    time_provider: Arc<dyn TimeProvider>,
    logger: Arc<dyn InternalLogger>,
    metrics: Arc<PipelineMetrics>,
    features: RwLock<HashMap<String, Arc<FeatureScope>>>,
}

impl SdkCore {
    /// Instance with host defaults: always connected, on external power.
    pub fn new(config: SdkCoreConfig, context: DatadogContext) -> Self {
        let logger: Arc<dyn InternalLogger> = Arc::new(TracingLogger);
        let feature_contexts = Arc::new(FeatureContextStore::new(
            CONTEXT_WRITE_TIMEOUT,
            logger.clone(),
        ));
        let context = DatadogContext {
            tracking_consent: config.tracking_consent,
            ..context
        };
        Self {
            context_provider: Arc::new(SdkContextProvider::new(context, feature_contexts.clone())),
            feature_contexts,
            network_info_provider: Arc::new(StaticNetworkInfoProvider::new(NetworkInfo::default())),
            system_info_provider: Arc::new(StaticSystemInfoProvider::new(SystemInfo::plugged_in())),
            time_provider: Arc::new(SystemTimeProvider),
            logger,
            metrics: Arc::new(PipelineMetrics::new()),
            features: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn with_network_info_provider(mut self, provider: Arc<dyn NetworkInfoProvider>) -> Self {
        self.network_info_provider = provider;
        self
    }

    pub fn with_system_info_provider(mut self, provider: Arc<dyn SystemInfoProvider>) -> Self {
        self.system_info_provider = provider;
        self
    }

    pub fn with_time_provider(mut self, provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = provider;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn InternalLogger>) -> Self {
        self.feature_contexts.set_logger(logger.clone());
        self.logger = logger;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn tracking_consent(&self) -> TrackingConsent {
        self.context_provider.context().tracking_consent
    }

    /// Builds the store, uploader and scheduler of a feature.
    ///
    /// Uploads only begin once `start` (or the feature's `start_uploads`) is called.
    pub fn register_feature(&self, feature: FeatureConfig) -> Result<Arc<FeatureScope>, RegistryError> {
        let mut features = self.features.write();
        if features.contains_key(&feature.name) {
            return Err(RegistryError::FeatureAlreadyRegistered(feature.name));
        }

        let storage = Arc::new(ConsentAwareStorage::new(
            &self.config.storage_dir,
            feature.name.clone(),
            self.config.persistence.clone(),
            self.tracking_consent(),
            self.time_provider.clone(),
            self.logger.clone(),
            self.metrics.clone(),
        ));
        let uploader = Arc::new(HttpDataUploader::new(
            &self.config.client,
            feature.request_factory,
            self.logger.clone(),
        )?);
        let runnable = UploadRunnable::builder(
            feature.name.clone(),
            storage.clone(),
            uploader.clone(),
            self.context_provider.clone(),
            self.network_info_provider.clone(),
            self.system_info_provider.clone(),
            Arc::new(DefaultUploadSchedulerStrategy::new(&self.config.upload)),
        )
        .max_batches_per_job(self.config.upload.max_batches_per_upload_job)
        .logger(self.logger.clone())
        .metrics(self.metrics.clone())
        .build();
        let scheduler = UploadScheduler::new(Arc::new(runnable), self.config.upload.default_delay());
        let flusher = DataFlusher::new(
            storage.clone(),
            self.context_provider.clone(),
            self.logger.clone(),
        );

        let scope = Arc::new(FeatureScope::new(
            feature.name.clone(),
            storage,
            uploader,
            scheduler,
            flusher,
        ));
        features.insert(feature.name.clone(), scope.clone());
        self.logger.log_one(
            LogLevel::Debug,
            LogTarget::Maintainer,
            &format!("Feature {} registered", feature.name),
        );
        Ok(scope)
    }

    pub fn feature(&self, name: &str) -> Option<Arc<FeatureScope>> {
        self.features.read().get(name).cloned()
    }

    fn all_features(&self) -> Vec<Arc<FeatureScope>> {
        self.features.read().values().cloned().collect()
    }

    /// Starts the upload scheduler of every registered feature.
    pub fn start(&self) {
        for feature in self.all_features() {
            feature.start_uploads();
        }
    }

    pub async fn set_tracking_consent(&self, consent: TrackingConsent) {
        self.context_provider.set_tracking_consent(consent);
        let features = self.all_features();
        join_all(
            features
                .iter()
                .map(|feature| feature.storage().set_tracking_consent(consent)),
        )
        .await;
    }

    pub fn update_feature_context<F>(&self, feature: &str, update: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        self.feature_contexts.update(feature, update)
    }

    pub fn feature_context(&self, feature: &str) -> Map<String, Value> {
        self.feature_contexts.get(feature)
    }

    /// Sends every stored batch of every feature once. Returns the batch count.
    pub async fn flush_stored_data(&self) -> usize {
        let features = self.all_features();
        join_all(features.iter().map(|feature| feature.flush()))
            .await
            .into_iter()
            .sum()
    }

    pub async fn clear_all_data(&self) {
        let features = self.all_features();
        join_all(features.iter().map(|feature| feature.storage().drop_all())).await;
    }

    /// Stops every scheduler, waiting for runs in progress.
    pub async fn stop(&self) {
        let features = self.all_features();
        join_all(features.iter().map(|feature| feature.shutdown())).await;
    }
}
