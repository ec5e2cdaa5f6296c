use serde::{Deserialize, Serialize};

/// Severity of an internal pipeline message.
///
/// This is distinct from the configuration `LogLevel` (used for the tracing filter);
/// it is the level the pipeline attaches to what it reports about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Audience of an internal pipeline message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogTarget {
    /// The developer integrating the SDK.
    User,
    /// The SDK maintainers, for debugging.
    Maintainer,
    /// Self-reported telemetry sent back to the intake.
    Telemetry,
}

impl LogTarget {
    /// The tracing target messages for this audience are emitted under.
    pub const fn tracing_target(self) -> &'static str {
        match self {
            LogTarget::User => "dd_sdk::user",
            LogTarget::Maintainer => "dd_sdk::maintainer",
            LogTarget::Telemetry => "dd_sdk::telemetry",
        }
    }
}
