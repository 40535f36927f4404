use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("empty device endpoint")]
    Empty,

    #[error("expected host:port, got {0:?}")]
    MissingPort(String),

    #[error("invalid port in {0:?}")]
    BadPort(String),

    #[error("expected serial:<path>:<baud>, got {0:?}")]
    BadSerial(String),

    #[error("invalid baud rate in {0:?}")]
    BadBaud(String),
}

/// Where the sonar lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEndpoint {
    /// `host:port` of a ping proxy or a networked sonar.
    Udp { host: String, port: u16 },
    Serial { path: String, baud: u32 },
}

impl FromStr for DeviceEndpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EndpointError::Empty);
        }

        if let Some(rest) = s.strip_prefix("serial:") {
            let (path, baud) = rest
                .rsplit_once(':')
                .ok_or_else(|| EndpointError::BadSerial(s.to_string()))?;
            if path.is_empty() {
                return Err(EndpointError::BadSerial(s.to_string()));
            }
            let baud: u32 = baud.parse().map_err(|_| EndpointError::BadBaud(s.to_string()))?;
            if baud == 0 {
                return Err(EndpointError::BadBaud(s.to_string()));
            }
            return Ok(DeviceEndpoint::Serial { path: path.to_string(), baud });
        }

        let addr = s.strip_prefix("udp:").unwrap_or(s);
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(s.to_string()))?;
        if host.is_empty() {
            return Err(EndpointError::MissingPort(s.to_string()));
        }
        let port: u16 = port.parse().map_err(|_| EndpointError::BadPort(s.to_string()))?;
        Ok(DeviceEndpoint::Udp { host: host.to_string(), port })
    }
}

impl fmt::Display for DeviceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceEndpoint::Udp { host, port } => write!(f, "udp:{}:{}", host, port),
            DeviceEndpoint::Serial { path, baud } => write!(f, "serial:{}:{}", path, baud),
        }
    }
}
