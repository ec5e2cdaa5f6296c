use clap::{CommandFactory, Parser};
use dd_upload_pipeline::app::{Config, ConfigError, LogLevel, PayloadFormat};
use dd_upload_pipeline::domain::TrackingConsent;
use dd_upload_pipeline::storage::BatchSize;
use dd_upload_pipeline::upload::{BatchProcessingLevel, UploadFrequency};
use serial_test::serial;
use std::{env, time::Duration};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

const ENV_VARS: &[&str] = &[
    "DD_SITE",
    "DD_CLIENT_TOKEN",
    "DD_INTAKE_URL",
    "DD_FEATURE",
    "DD_SERVICE",
    "DD_ENV",
    "DD_VERSION",
    "DD_SOURCE",
    "DD_STORAGE_DIR",
    "DD_BATCH_SIZE",
    "DD_UPLOAD_FREQUENCY",
    "DD_BATCH_PROCESSING_LEVEL",
    "DD_TRACKING_CONSENT",
    "DD_PAYLOAD_FORMAT",
    "DD_CONNECTION_TIMEOUT_SECS",
    "DD_ENABLE_COMPRESSION",
    "LOG_LEVEL",
    "LOG_JSON",
    "CONFIG_FILE",
];

fn clean_env() {
    unsafe {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }
}

fn valid_config() -> Config {
    Config {
        client_token: "pub0123456789".to_string(),
        ..Config::default()
    }
}

#[test]
#[serial]
fn test_config_from_args() {
    clean_env();
    let dir = TempDir::new().unwrap();
    let storage_dir = dir.path().to_str().unwrap();

    let config = Config::from_args([
        "dd-upload-pipeline",
        "--client-token",
        "pub0123456789",
        "--feature-name",
        "rum",
        "--storage-dir",
        storage_dir,
        "--batch-size",
        "small",
        "--upload-frequency",
        "frequent",
        "--batch-processing-level",
        "low",
        "--tracking-consent",
        "pending",
        "--payload-format",
        "new-line",
        "--enable-compression",
    ])
    .unwrap();

    assert_eq!(config.feature_name, "rum");
    assert_eq!(config.storage_dir, dir.path());
    assert_eq!(config.tracking_consent, TrackingConsent::Pending);
    assert_eq!(config.payload_format, PayloadFormat::NewLine);
    assert!(config.enable_compression);
    assert_eq!(config.connection_timeout, Duration::from_secs(45));

    let persistence = config.persistence_config();
    assert_eq!(persistence.recent_delay, Duration::from_secs(1));

    let upload = config.upload_config();
    assert_eq!(upload.min_delay_ms(), 500);
    assert_eq!(upload.max_batches_per_upload_job, 1);
    assert_eq!(config.client_config().timeout, Duration::from_secs(45));
}

#[test]
fn test_cli_definition_is_consistent() {
    Config::command().debug_assert();
}

#[test]
#[serial]
fn test_host_version_flag_does_not_clash_with_version() {
    clean_env();
    let config = Config::from_args([
        "dd-upload-pipeline",
        "--client-token",
        "pub0123456789",
        "--app-version",
        "2.3.4",
    ])
    .unwrap();
    assert_eq!(config.version, "2.3.4");

    let err = Config::try_parse_from(["dd-upload-pipeline", "--version"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
}

#[test]
#[serial]
fn test_config_from_environment() {
    clean_env();
    unsafe {
        env::set_var("DD_CLIENT_TOKEN", "env-token");
        env::set_var("DD_INTAKE_URL", "https://intake.example/api/v2/logs");
        env::set_var("DD_BATCH_PROCESSING_LEVEL", "HIGH");
        env::set_var("DD_TRACKING_CONSENT", "not-granted");
        env::set_var("DD_CONNECTION_TIMEOUT_SECS", "10");
        env::set_var("DD_ENABLE_COMPRESSION", "true");
        env::set_var("LOG_LEVEL", "warn");
    }

    let config = Config::from_env();
    clean_env();
    let config = config.unwrap();

    assert_eq!(config.client_token, "env-token");
    assert_eq!(config.endpoint, "https://intake.example/api/v2/logs");
    assert_eq!(config.batch_processing_level, BatchProcessingLevel::High);
    assert_eq!(config.upload_config().max_batches_per_upload_job, 100);
    assert_eq!(config.tracking_consent, TrackingConsent::NotGranted);
    assert_eq!(config.connection_timeout, Duration::from_secs(10));
    assert!(config.enable_compression);
    assert_eq!(config.log_level, LogLevel::Warn);
}

#[test]
#[serial]
fn test_invalid_environment_value() {
    clean_env();
    unsafe {
        env::set_var("DD_CLIENT_TOKEN", "env-token");
        env::set_var("DD_UPLOAD_FREQUENCY", "sometimes");
    }

    let result = Config::from_env();
    clean_env();

    assert!(matches!(result, Err(ConfigError::EnvError(message)) if message.contains("DD_UPLOAD_FREQUENCY")));
}

#[test]
#[serial]
fn test_config_from_file() {
    clean_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.toml");
    std::fs::write(
        &path,
        r#"
client_token = "file-token"
endpoint = "https://intake.example/api/v2/rum"
feature_name = "rum"
batch_size = "large"
upload_frequency = "rare"
tracking_consent = "not_granted"
payload_format = "new-line"
log_level = "debug"

[persistence]
max_item_size = 1024
old_file_threshold = 60000
cleanup_frequency = 1000
"#,
    )
    .unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.client_token, "file-token");
    assert_eq!(config.feature_name, "rum");
    assert_eq!(config.batch_size, BatchSize::Large);
    assert_eq!(config.upload_frequency, UploadFrequency::Rare);
    assert_eq!(config.tracking_consent, TrackingConsent::NotGranted);
    assert_eq!(config.payload_format, PayloadFormat::NewLine);
    assert_eq!(config.log_level, LogLevel::Debug);
    // Untouched keys keep their defaults.
    assert_eq!(config.site, "datadoghq.com");

    let persistence = config.persistence_config();
    assert_eq!(persistence.recent_delay, Duration::from_secs(10));
    assert_eq!(persistence.max_item_size, 1024);
    assert_eq!(persistence.old_file_threshold, Duration::from_secs(60));
    assert_eq!(persistence.cleanup_frequency, Duration::from_secs(1));
    assert_eq!(persistence.max_items_per_batch, 500);

    // --config-file takes over the command line.
    let from_args = Config::from_args([
        "dd-upload-pipeline",
        "--config-file",
        path.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(from_args.client_token, "file-token");
}

#[test]
#[serial]
fn test_malformed_file_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "client_token = [unterminated").unwrap();

    assert!(matches!(Config::from_file(&path), Err(ConfigError::ParseError(_))));
    assert!(matches!(
        Config::from_file(dir.path().join("missing.toml")),
        Err(ConfigError::FileError(_))
    ));
}

#[test]
fn test_validation() {
    assert_ok!(valid_config().validate());

    // Default config has no token.
    assert_err!(Config::default().validate());

    let invalid = [
        Config {
            endpoint: "not a url".to_string(),
            ..valid_config()
        },
        Config {
            endpoint: "ftp://intake.example/logs".to_string(),
            ..valid_config()
        },
        Config {
            feature_name: "../logs".to_string(),
            ..valid_config()
        },
        Config {
            connection_timeout_secs: 0,
            ..valid_config()
        },
    ];
    for config in invalid {
        assert_err!(config.validate(), "{config:?}");
    }

    let mut config = valid_config();
    config.persistence.max_item_size = config.persistence.max_batch_size + 1;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));

    let mut config = valid_config();
    config.persistence.max_disk_space = 1;
    assert!(matches!(config.validate(), Err(ConfigError::InvalidConfig(_))));
}
