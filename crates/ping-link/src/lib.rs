pub mod device;
pub mod doctor;
pub mod endpoint;
pub mod probe;

use serde::Deserialize;

pub use device::{DeviceChannel, DeviceLink};
pub use endpoint::{DeviceEndpoint, EndpointError};

/// `[device]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// `udp:host:port`, bare `host:port`, or `serial:/dev/ttyUSB0:115200`.
    pub endpoint: String,

    /// Local address for the UDP socket. Ignored for serial devices.
    pub bind: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            endpoint: "0.0.0.0:9090".into(),
            bind: "0.0.0.0:0".into(),
        }
    }
}
