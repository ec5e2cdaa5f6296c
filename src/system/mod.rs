//! Pull-based providers for the device state the upload scheduler consults.

pub mod network;
pub mod system_info;
pub mod time;

pub use network::{Connectivity, NetworkInfo, NetworkInfoProvider, StaticNetworkInfoProvider};
pub use system_info::{StaticSystemInfoProvider, SystemInfo, SystemInfoProvider};
pub use time::{ManualTimeProvider, SystemTimeProvider, TimeProvider};
