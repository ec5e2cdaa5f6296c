use super::config::LogLevel;
use parking_lot::RwLock;
use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{0}'")]
    InvalidDirective(String),
    #[error("Failed to create EnvFilter with '{filter}': {reason}")]
    Filter { filter: String, reason: String },
    #[error("Failed to set global tracing subscriber: {0}")]
    Subscriber(String),
    #[error("Logging system initialization failed")]
    AlreadyFailed,
}

/// Builds the process-wide `tracing` subscriber.
///
/// SDK messages carry the `dd_sdk::user`, `dd_sdk::maintainer` and
/// `dd_sdk::telemetry` targets and follow the default level.
pub struct LoggingSystem {
    directives: RwLock<Vec<String>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: RwLock::new(Vec::new()),
        }
    }

    /// Adds a `target=level` directive.
    pub fn add_directive(&self, directive: &str) -> Result<(), LoggingError> {
        let Some((target, level)) = directive.split_once('=') else {
            return Err(LoggingError::InvalidDirective(directive.to_string()));
        };
        if target.is_empty() || level.parse::<tracing::Level>().is_err() {
            return Err(LoggingError::InvalidDirective(directive.to_string()));
        }
        self.directives.write().push(directive.to_string());
        Ok(())
    }

    /// Quietens the HTTP stack.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["hyper", "hyper_util", "reqwest", "h2", "rustls"] {
            directives.push(format!("{target}=warn"));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        let mut filter_parts = Vec::with_capacity(directives.len() + 1);
        filter_parts.push(default_level.as_str().to_string());
        filter_parts.extend(directives.iter().cloned());
        filter_parts.join(",")
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

    pub fn initialize_tracing(&self, default_level: LogLevel, json: bool) -> Result<(), LoggingError> {
        let filter_string = self.build_filter_string(default_level);
        let env_filter = EnvFilter::try_new(&filter_string).map_err(|e| LoggingError::Filter {
            filter: filter_string.clone(),
            reason: e.to_string(),
        })?;

        let result = if json {
            let subscriber = tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_target(true).with_current_span(false));
            tracing::subscriber::set_global_default(subscriber)
        } else {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(true)
                    .compact(),
            );
            tracing::subscriber::set_global_default(subscriber)
        };
        result.map_err(|e| LoggingError::Subscriber(e.to_string()))
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the subscriber once per process. Later calls report the first outcome.
pub fn setup_logging_safe(level: LogLevel, json: bool) -> Result<(), LoggingError> {
    static INIT: OnceLock<bool> = OnceLock::new();

    let initialized = *INIT.get_or_init(|| {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        match logging_system.initialize_tracing(level, json) {
            Ok(()) => true,
            Err(e) => {
                eprintln!("Warning: {e}");
                false
            }
        }
    });

    if initialized {
        Ok(())
    } else {
        Err(LoggingError::AlreadyFailed)
    }
}
