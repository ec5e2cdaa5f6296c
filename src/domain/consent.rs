use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// User consent for data collection.
///
/// `Pending` events are persisted aside and only become uploadable once consent
/// is granted; `NotGranted` events are discarded at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingConsent {
    #[default]
    Granted,
    NotGranted,
    Pending,
}
