use super::groups::{PersistenceConfig, UploadConfig};
use super::serde_helpers::{load_env, load_env_enum, load_env_opt};
use super::{ConfigError, LogLevel, PayloadFormat};
use crate::domain::TrackingConsent;
use crate::storage::{BatchSize, FilePersistenceConfig};
use crate::upload::{BatchProcessingLevel, ClientConfig, DataUploadConfiguration, UploadFrequency};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_INTAKE_URL: &str = "https://browser-intake-datadoghq.com/api/v2/logs";
pub const DEFAULT_STORAGE_DIR: &str = "/tmp/dd-upload-pipeline";

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Datadog site the events belong to
    #[arg(long, env = "DD_SITE", default_value = "datadoghq.com")]
    pub site: String,

    /// Client token sent as the intake API key
    #[arg(long, env = "DD_CLIENT_TOKEN", default_value = "")]
    pub client_token: String,

    /// Intake endpoint URL
    #[arg(long, env = "DD_INTAKE_URL", default_value = DEFAULT_INTAKE_URL)]
    pub endpoint: String,

    /// Name of the feature the events are stored under
    #[arg(long, env = "DD_FEATURE", default_value = "logs")]
    pub feature_name: String,

    #[arg(long, env = "DD_SERVICE", default_value = "dd-upload-pipeline")]
    pub service: String,

    #[arg(long, env = "DD_ENV", default_value = "prod")]
    pub env: String,

    /// Version of the host application
    #[arg(id = "app_version", long = "app-version", env = "DD_VERSION", default_value = "1.0.0")]
    pub version: String,

    /// Value of the `ddsource` query parameter and origin header
    #[arg(long, env = "DD_SOURCE", default_value = "rust")]
    pub source: String,

    /// Directory holding the batch files
    #[arg(long, env = "DD_STORAGE_DIR", default_value = DEFAULT_STORAGE_DIR)]
    pub storage_dir: PathBuf,

    /// How long a batch file stays open for writes
    #[arg(long, env = "DD_BATCH_SIZE", default_value = "medium")]
    pub batch_size: BatchSize,

    #[arg(long, env = "DD_UPLOAD_FREQUENCY", default_value = "average")]
    pub upload_frequency: UploadFrequency,

    /// How many batches one upload run may send
    #[arg(long, env = "DD_BATCH_PROCESSING_LEVEL", default_value = "medium")]
    pub batch_processing_level: BatchProcessingLevel,

    #[arg(long, env = "DD_TRACKING_CONSENT", default_value = "granted")]
    pub tracking_consent: TrackingConsent,

    /// Framing of the events in a request body
    #[arg(long, env = "DD_PAYLOAD_FORMAT", default_value = "json-array")]
    pub payload_format: PayloadFormat,

    /// Request timeout in seconds
    #[arg(long, env = "DD_CONNECTION_TIMEOUT_SECS", default_value = "45")]
    pub connection_timeout_secs: u64,

    /// Gzip request bodies
    #[arg(long, env = "DD_ENABLE_COMPRESSION")]
    pub enable_compression: bool,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines instead of compact text
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Batch file tuning (configuration file only)
    #[arg(skip)]
    pub persistence: PersistenceConfig,

    /// Derived fields (not CLI arguments)
    #[serde(skip)]
    #[arg(skip)]
    pub connection_timeout: Duration,

    #[serde(skip)]
    #[arg(skip)]
    pub upload: UploadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: "datadoghq.com".to_string(),
            client_token: String::new(),
            endpoint: DEFAULT_INTAKE_URL.to_string(),
            feature_name: "logs".to_string(),
            service: "dd-upload-pipeline".to_string(),
            env: "prod".to_string(),
            version: "1.0.0".to_string(),
            source: "rust".to_string(),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            batch_size: BatchSize::Medium,
            upload_frequency: UploadFrequency::Average,
            batch_processing_level: BatchProcessingLevel::Medium,
            tracking_consent: TrackingConsent::Granted,
            payload_format: PayloadFormat::JsonArray,
            connection_timeout_secs: 45,
            enable_compression: false,
            log_level: LogLevel::Info,
            log_json: false,
            config_file: None,
            persistence: PersistenceConfig::default(),
            connection_timeout: Duration::from_secs(45),
            upload: UploadConfig::default(),
        }
    }
}

impl Config {
    /// Parses CLI arguments; a `--config-file` replaces them with the file's content.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut config = Config::parse_from(args);
        if let Some(path) = config.config_file.clone() {
            return Self::from_file(path);
        }
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        load_env("DD_SITE", &mut config.site)?;
        load_env("DD_CLIENT_TOKEN", &mut config.client_token)?;
        load_env("DD_INTAKE_URL", &mut config.endpoint)?;
        load_env("DD_FEATURE", &mut config.feature_name)?;
        load_env("DD_SERVICE", &mut config.service)?;
        load_env("DD_ENV", &mut config.env)?;
        load_env("DD_VERSION", &mut config.version)?;
        load_env("DD_SOURCE", &mut config.source)?;
        load_env("DD_STORAGE_DIR", &mut config.storage_dir)?;
        load_env_enum("DD_BATCH_SIZE", &mut config.batch_size)?;
        load_env_enum("DD_UPLOAD_FREQUENCY", &mut config.upload_frequency)?;
        load_env_enum("DD_BATCH_PROCESSING_LEVEL", &mut config.batch_processing_level)?;
        load_env_enum("DD_TRACKING_CONSENT", &mut config.tracking_consent)?;
        load_env_enum("DD_PAYLOAD_FORMAT", &mut config.payload_format)?;
        load_env("DD_CONNECTION_TIMEOUT_SECS", &mut config.connection_timeout_secs)?;
        load_env("DD_ENABLE_COMPRESSION", &mut config.enable_compression)?;
        load_env_enum("LOG_LEVEL", &mut config.log_level)?;
        load_env("LOG_JSON", &mut config.log_json)?;
        load_env_opt("CONFIG_FILE", &mut config.config_file)?;

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.connection_timeout = Duration::from_secs(self.connection_timeout_secs);
        self.persistence.batch_size = self.batch_size;
        self.upload = UploadConfig {
            frequency: self.upload_frequency,
            batch_processing_level: self.batch_processing_level,
        };
        Ok(())
    }

    pub fn persistence_config(&self) -> FilePersistenceConfig {
        FilePersistenceConfig::from(&self.persistence)
    }

    pub fn upload_config(&self) -> DataUploadConfiguration {
        DataUploadConfiguration::from(&self.upload)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: self.connection_timeout,
            ..ClientConfig::default()
        }
    }
}
