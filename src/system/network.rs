use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    NetworkNotConnected,
    NetworkEthernet,
    NetworkWifi,
    NetworkWimax,
    NetworkBluetooth,
    NetworkMobileOther,
    #[default]
    NetworkOther,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub connectivity: Connectivity,
    pub carrier_name: Option<String>,
    pub up_kbps: Option<u64>,
    pub down_kbps: Option<u64>,
}

impl NetworkInfo {
    pub fn connected(connectivity: Connectivity) -> Self {
        Self {
            connectivity,
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity != Connectivity::NetworkNotConnected
    }
}

#[cfg_attr(test, automock)]
pub trait NetworkInfoProvider: Send + Sync {
    fn latest_network_info(&self) -> NetworkInfo;
}

/// Provider returning whatever was last set, for hosts without a connectivity API.
#[derive(Debug, Default)]
pub struct StaticNetworkInfoProvider {
    info: RwLock<NetworkInfo>,
}

impl StaticNetworkInfoProvider {
    pub fn new(info: NetworkInfo) -> Self {
        Self {
            info: RwLock::new(info),
        }
    }

    pub fn set(&self, info: NetworkInfo) {
        *self.info.write() = info;
    }
}

impl NetworkInfoProvider for StaticNetworkInfoProvider {
    fn latest_network_info(&self) -> NetworkInfo {
        self.info.read().clone()
    }
}
