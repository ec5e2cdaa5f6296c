//! Internal logger used by the pipeline to report on itself.
//!
//! Every message carries a level and one or more audiences ([`LogTarget`]). The
//! default implementation forwards to `tracing`, one event per audience, under
//! the audience's tracing target so subscribers can route them separately.

use crate::domain::{LogLevel, LogTarget};

pub trait InternalLogger: Send + Sync {
    fn log(&self, level: LogLevel, targets: &[LogTarget], message: &str);

    fn log_one(&self, level: LogLevel, target: LogTarget, message: &str) {
        self.log(level, &[target], message);
    }
}

/// `InternalLogger` backed by the global tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

// tracing needs the level and target at the callsite, hence one arm per pair.
macro_rules! emit {
    ($target:literal, $level:expr, $message:expr) => {
        match $level {
            LogLevel::Debug => tracing::debug!(target: $target, "{}", $message),
            LogLevel::Info => tracing::info!(target: $target, "{}", $message),
            LogLevel::Warn => tracing::warn!(target: $target, "{}", $message),
            LogLevel::Error => tracing::error!(target: $target, "{}", $message),
        }
    };
}

impl InternalLogger for TracingLogger {
    fn log(&self, level: LogLevel, targets: &[LogTarget], message: &str) {
        for target in targets {
            match target {
                LogTarget::User => emit!("dd_sdk::user", level, message),
                LogTarget::Maintainer => emit!("dd_sdk::maintainer", level, message),
                LogTarget::Telemetry => emit!("dd_sdk::telemetry", level, message),
            }
        }
    }
}
