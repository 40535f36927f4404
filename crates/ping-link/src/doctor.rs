use std::net::SocketAddr;

use anyhow::{Context, Result};

use crate::endpoint::DeviceEndpoint;
use crate::DeviceConfig;

pub fn check_device(cfg: &DeviceConfig) -> Result<DeviceEndpoint> {
    let endpoint: DeviceEndpoint = cfg
        .endpoint
        .parse()
        .with_context(|| format!("device.endpoint {:?}", cfg.endpoint))?;
    if matches!(endpoint, DeviceEndpoint::Udp { .. }) {
        cfg.bind
            .parse::<SocketAddr>()
            .with_context(|| format!("device.bind {:?} is not an ip:port", cfg.bind))?;
    }
    Ok(endpoint)
}
