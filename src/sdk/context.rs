use super::RegistryError;
use crate::domain::{LogLevel, LogTarget, TrackingConsent};
use crate::internal_logger::InternalLogger;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Maximum wait for the feature context write lock before the update is abandoned.
pub const CONTEXT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything a request factory may need to address and tag a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatadogContext {
    pub site: String,
    pub client_token: String,
    pub service: String,
    pub env: String,
    pub version: String,
    pub source: String,
    pub sdk_version: String,
    pub tracking_consent: TrackingConsent,
    pub feature_contexts: HashMap<String, Map<String, Value>>,
}

pub trait ContextProvider: Send + Sync {
    fn context(&self) -> DatadogContext;
}

/// Per-feature key/value contexts shared between features.
pub struct FeatureContextStore {
    contexts: RwLock<HashMap<String, Map<String, Value>>>,
    write_timeout: Duration,
    logger: RwLock<Arc<dyn InternalLogger>>,
}

impl FeatureContextStore {
    pub fn new(write_timeout: Duration, logger: Arc<dyn InternalLogger>) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            write_timeout,
            logger: RwLock::new(logger),
        }
    }

    pub fn set_logger(&self, logger: Arc<dyn InternalLogger>) {
        *self.logger.write() = logger;
    }

    /// Applies `update` to the context of `feature`.
    ///
    /// Gives up, without applying anything, if the lock is not acquired in time.
    pub fn update<F>(&self, feature: &str, update: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let Some(mut contexts) = self.contexts.try_write_for(self.write_timeout) else {
            self.logger.read().log(
                LogLevel::Error,
                &[LogTarget::Maintainer, LogTarget::Telemetry],
                &format!(
                    "Timed out after {:?} waiting to update the context of feature {feature}",
                    self.write_timeout
                ),
            );
            return Err(RegistryError::ContextLockTimeout(feature.to_string()));
        };
        update(contexts.entry(feature.to_string()).or_default());
        Ok(())
    }

    pub fn get(&self, feature: &str) -> Map<String, Value> {
        self.contexts.read().get(feature).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> HashMap<String, Map<String, Value>> {
        self.contexts.read().clone()
    }
}

/// Context made of a mutable base plus the current feature contexts.
pub struct SdkContextProvider {
    base: RwLock<DatadogContext>,
    feature_contexts: Arc<FeatureContextStore>,
}

impl SdkContextProvider {
    pub fn new(base: DatadogContext, feature_contexts: Arc<FeatureContextStore>) -> Self {
        Self {
            base: RwLock::new(base),
            feature_contexts,
        }
    }

    pub fn set_tracking_consent(&self, consent: TrackingConsent) {
        self.base.write().tracking_consent = consent;
    }
}

impl ContextProvider for SdkContextProvider {
    fn context(&self) -> DatadogContext {
        let mut context = self.base.read().clone();
        context.feature_contexts = self.feature_contexts.snapshot();
        context
    }
}
