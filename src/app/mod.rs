pub mod config;
pub mod logging_system;
pub mod service;
pub mod shutdown;

pub use config::{Config, ConfigError, LogLevel, PayloadFormat};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging_safe};
pub use service::{IngestStats, RunSummary, ServiceError, ServiceManager};
pub use shutdown::wait_for_shutdown_signal;

use crate::metrics::PipelineMetrics;
use tokio::io::BufReader;
use tracing::info;

pub struct App {
    config: Config,
    service_manager: ServiceManager,
}

impl App {
    pub fn from_args<I, T>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Config::from_args(args)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        if let Err(e) = setup_logging_safe(config.log_level, config.log_json) {
            eprintln!("Warning: {e}");
        }

        info!("Starting dd-upload-pipeline v{}", get_version());
        info!(
            "Configuration: feature={}, endpoint={}, storage_dir={}, consent={:?}",
            config.feature_name,
            config.endpoint,
            config.storage_dir.display(),
            config.tracking_consent
        );

        let service_manager = ServiceManager::new(&config)?;
        Ok(Self {
            config,
            service_manager,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Pipes stdin into the feature until EOF or a shutdown signal.
    pub async fn run(self) -> anyhow::Result<RunSummary> {
        let stdin = BufReader::new(tokio::io::stdin());
        let summary = self
            .service_manager
            .run(stdin, wait_for_shutdown_signal())
            .await?;

        log_final_metrics(self.service_manager.core().metrics());

        info!("dd-upload-pipeline stopped.");
        Ok(summary)
    }
}

fn log_final_metrics(metrics: &PipelineMetrics) {
    #[cfg(feature = "metrics")]
    {
        if let Some(text) = metrics.export_text() {
            tracing::debug!("Final metrics:\n{text}");
        }
    }
    let snapshot = metrics.snapshot();
    info!(
        "Batches: sent={}, retried={}, dropped={}, deleted={}",
        snapshot.batches_sent,
        snapshot.batches_retried,
        snapshot.batches_dropped,
        snapshot.batches_deleted
    );
}

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let app = App::from_args(std::env::args_os())?;
    app.run().await?;
    Ok(())
}
