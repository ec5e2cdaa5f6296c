use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

/// Uploads are refused when the battery is at or below this level.
pub const LOW_BATTERY_THRESHOLD: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub battery_full_or_charging: bool,
    /// Battery percentage, `-1` when unknown.
    pub battery_level: i32,
    pub power_save_mode: bool,
    pub on_external_power_source: bool,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            battery_full_or_charging: false,
            battery_level: -1,
            power_save_mode: false,
            on_external_power_source: false,
        }
    }
}

impl SystemInfo {
    /// A device running from mains power, e.g. a server or desktop host.
    pub fn plugged_in() -> Self {
        Self {
            on_external_power_source: true,
            ..Self::default()
        }
    }

    pub fn has_enough_power(&self) -> bool {
        self.battery_full_or_charging
            || self.on_external_power_source
            || self.battery_level > LOW_BATTERY_THRESHOLD
    }

    /// Whether the device state lets an upload proceed.
    pub fn allows_upload(&self) -> bool {
        self.has_enough_power() && !self.power_save_mode
    }
}

#[cfg_attr(test, automock)]
pub trait SystemInfoProvider: Send + Sync {
    fn latest_system_info(&self) -> SystemInfo;
}

#[derive(Debug, Default)]
pub struct StaticSystemInfoProvider {
    info: RwLock<SystemInfo>,
}

impl StaticSystemInfoProvider {
    pub fn new(info: SystemInfo) -> Self {
        Self {
            info: RwLock::new(info),
        }
    }

    pub fn set(&self, info: SystemInfo) {
        *self.info.write() = info;
    }
}

impl SystemInfoProvider for StaticSystemInfoProvider {
    fn latest_system_info(&self) -> SystemInfo {
        *self.info.read()
    }
}
