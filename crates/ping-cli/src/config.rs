use std::path::{Path, PathBuf};

use ping_bridge::BridgeConfig;
use ping_fc::MavlinkConfig;
use ping_link::DeviceConfig;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// `[probe]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_ms: 1500 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub mavlink: MavlinkConfig,
    pub bridge: BridgeConfig,
    pub probe: ProbeConfig,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub ping: Option<String>,
    pub mavlink: Option<String>,
    pub min_confidence: Option<u8>,
    pub poll_interval_ms: Option<u64>,
}

impl Config {
    pub fn apply(mut self, o: Overrides) -> Self {
        if let Some(v) = o.ping {
            self.device.endpoint = v;
        }
        if let Some(v) = o.mavlink {
            self.mavlink.endpoint = v;
        }
        if let Some(v) = o.min_confidence {
            self.bridge.min_confidence = v;
        }
        if let Some(v) = o.poll_interval_ms {
            self.bridge.poll_interval_ms = v;
        }
        self
    }
}

pub fn parse_config(s: &str, path: &Path) -> Result<Config, ConfigError> {
    toml::from_str(s).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

/// Without a file every section takes its defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    parse_config(&s, path)
}
