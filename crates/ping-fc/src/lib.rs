pub mod mav;

use serde::Deserialize;

pub use mav::{DistanceReport, TelemetryChannel, TelemetrySink};

/// `[mavlink]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MavlinkConfig {
    /// Autopilot (or mavproxy) address. A bare `host:port` means `udpout:host:port`;
    /// any other MAVLink connection string is passed through.
    pub endpoint: String,

    /// MAVLink ids we send as (companion side).
    pub sys_id: u8,
    pub comp_id: u8,
}

impl Default for MavlinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "0.0.0.0:9000".into(),
            sys_id: 1,
            comp_id: 192,
        }
    }
}

impl MavlinkConfig {
    pub fn connection_url(&self) -> String {
        const SCHEMES: [&str; 6] = ["udpout:", "udpin:", "udpbcast:", "tcpout:", "tcpin:", "serial:"];
        if SCHEMES.iter().any(|s| self.endpoint.starts_with(s)) {
            self.endpoint.clone()
        } else {
            format!("udpout:{}", self.endpoint)
        }
    }
}
