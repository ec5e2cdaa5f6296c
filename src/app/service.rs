use super::Config;
use crate::domain::RawBatchEvent;
use crate::sdk::{DatadogContext, FeatureConfig, FeatureScope, RegistryError, SdkCore, SdkCoreConfig};
use crate::upload::{DefaultRequestFactory, PayloadDecoration};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] super::ConfigError),
    #[error("Feature registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("Failed to read input: {0}")]
    Input(#[from] std::io::Error),
}

/// Counts of one ingestion session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ingest: IngestStats,
    pub interrupted: bool,
    pub flushed_batches: usize,
}

/// Wires one feature of an `SdkCore` to a line-oriented event source.
pub struct ServiceManager {
    core: Arc<SdkCore>,
    feature: Arc<FeatureScope>,
}

impl ServiceManager {
    pub fn new(config: &Config) -> Result<Self, ServiceError> {
        let core = SdkCore::new(
            SdkCoreConfig {
                storage_dir: config.storage_dir.clone(),
                persistence: config.persistence_config(),
                upload: config.upload_config(),
                client: config.client_config(),
                tracking_consent: config.tracking_consent,
            },
            DatadogContext {
                site: config.site.clone(),
                client_token: config.client_token.clone(),
                service: config.service.clone(),
                env: config.env.clone(),
                version: config.version.clone(),
                source: config.source.clone(),
                sdk_version: crate::VERSION.to_string(),
                ..DatadogContext::default()
            },
        );
        Self::with_core(Arc::new(core), config)
    }

    /// Registers the configured feature on an existing core.
    pub fn with_core(core: Arc<SdkCore>, config: &Config) -> Result<Self, ServiceError> {
        let decoration: PayloadDecoration = config.payload_format.into();
        let factory = DefaultRequestFactory::new(
            config.endpoint.clone(),
            decoration,
            config.enable_compression,
        );
        let feature = core.register_feature(FeatureConfig {
            name: config.feature_name.clone(),
            request_factory: Arc::new(factory),
        })?;
        Ok(Self { core, feature })
    }

    pub fn core(&self) -> &Arc<SdkCore> {
        &self.core
    }

    pub fn feature(&self) -> &Arc<FeatureScope> {
        &self.feature
    }

    /// Writes each non-blank line as one event until the reader ends.
    pub async fn ingest<R>(&self, reader: R) -> Result<IngestStats, ServiceError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut stats = IngestStats::default();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                stats.skipped += 1;
                continue;
            }
            if self.feature.write(&RawBatchEvent::from(line), None).await {
                stats.accepted += 1;
            } else {
                stats.rejected += 1;
            }
        }
        Ok(stats)
    }

    /// Starts uploads, ingests until the reader ends or `shutdown` resolves,
    /// then stops the schedulers and flushes what is left on disk.
    pub async fn run<R, F>(&self, reader: R, shutdown: F) -> Result<RunSummary, ServiceError>
    where
        R: AsyncBufRead + Unpin,
        F: Future<Output = ()>,
    {
        self.core.start();
        info!("Uploading feature '{}'", self.feature.name());

        let mut summary = RunSummary::default();
        let ingest = self.ingest(reader);
        tokio::pin!(ingest);
        tokio::pin!(shutdown);

        let outcome = tokio::select! {
            result = &mut ingest => Some(result),
            () = &mut shutdown => None,
        };
        match outcome {
            Some(result) => match result {
                Ok(stats) => summary.ingest = stats,
                Err(e) => {
                    self.core.stop().await;
                    return Err(e);
                }
            },
            None => summary.interrupted = true,
        }

        self.core.stop().await;
        summary.flushed_batches = self.core.flush_stored_data().await;
        if summary.ingest.rejected > 0 {
            warn!("{} events were rejected by the batch writer", summary.ingest.rejected);
        }
        info!(
            "Pipeline stopped: accepted={}, rejected={}, flushed_batches={}",
            summary.ingest.accepted, summary.ingest.rejected, summary.flushed_batches
        );
        Ok(summary)
    }
}
