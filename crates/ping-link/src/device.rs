use std::io::{self, Read, Write};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_serial::SerialPort;
use tracing::info;

use crate::endpoint::DeviceEndpoint;
use crate::DeviceConfig;

/// Non-blocking byte link to one sonar.
///
/// `send` is best-effort; callers log failures and carry on.
/// `try_receive` returns `Ok(None)` when nothing is pending. Any `Err` from
/// it means the link itself is unusable.
pub trait DeviceLink {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
    fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;
}

pub struct UdpLink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpLink {
    pub async fn open(bind: &str, target: &str) -> Result<Self> {
        let target = tokio::net::lookup_host(target)
            .await
            .with_context(|| format!("resolve device address {}", target))?
            .next()
            .with_context(|| format!("no address for {}", target))?;
        // std socket: tokio's try_send_to reports WouldBlock until the
        // reactor has seen readiness.
        let socket = UdpSocket::bind(bind).with_context(|| format!("bind device socket {}", bind))?;
        socket.set_nonblocking(true).context("set device socket non-blocking")?;
        info!("device: udp {} -> {}", socket.local_addr()?, target);
        Ok(Self { socket, target })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DeviceLink for UdpLink {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.socket
            .send_to(bytes, self.target)
            .with_context(|| format!("udp send to {}", self.target))?;
        Ok(())
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((n, _from)) => Ok(Some(n)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = tokio_serial::new(path, baud)
            .timeout(Duration::from_millis(10))
            .open()
            .with_context(|| format!("open sonar serial device {}", path))?;
        info!("device: serial {} @ {}", path, baud);
        Ok(Self { port })
    }
}

impl DeviceLink for SerialLink {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes).context("serial write")?;
        Ok(())
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        // Only read what is already buffered so the read cannot block.
        let available = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
        if available == 0 || buf.is_empty() {
            return Ok(None);
        }
        let n = available.min(buf.len());
        match self.port.read(&mut buf[..n]) {
            Ok(n) => Ok(Some(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// The configured sonar link.
pub enum DeviceChannel {
    Udp(UdpLink),
    Serial(SerialLink),
}

impl DeviceChannel {
    pub async fn open(cfg: &DeviceConfig) -> Result<Self> {
        let endpoint: DeviceEndpoint = cfg
            .endpoint
            .parse()
            .with_context(|| format!("device.endpoint {:?}", cfg.endpoint))?;
        match endpoint {
            DeviceEndpoint::Udp { host, port } => {
                let target = format!("{}:{}", host, port);
                Ok(Self::Udp(UdpLink::open(&cfg.bind, &target).await?))
            }
            DeviceEndpoint::Serial { path, baud } => Ok(Self::Serial(SerialLink::open(&path, baud)?)),
        }
    }
}

impl DeviceLink for DeviceChannel {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        match self {
            DeviceChannel::Udp(l) => l.send(bytes),
            DeviceChannel::Serial(l) => l.send(bytes),
        }
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self {
            DeviceChannel::Udp(l) => l.try_receive(buf),
            DeviceChannel::Serial(l) => l.try_receive(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn receive_within(link: &mut UdpLink, buf: &mut [u8]) -> Option<usize> {
        for _ in 0..100 {
            if let Some(n) = link.try_receive(buf).unwrap() {
                return Some(n);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_udp_link_nothing_pending_is_not_an_error() {
        let mut link = UdpLink::open("127.0.0.1:0", "127.0.0.1:9").await.unwrap();
        let mut buf = [0u8; 64];
        assert!(link.try_receive(&mut buf).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_udp_link_loopback() {
        let device = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let device_addr = device.local_addr().unwrap();
        let mut link = UdpLink::open("127.0.0.1:0", &device_addr.to_string()).await.unwrap();

        link.send(b"BR-request").unwrap();
        let mut buf = [0u8; 64];
        let (n, from) = device.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"BR-request");
        assert_eq!(from, link.local_addr().unwrap());

        device.send_to(b"reply", from).await.unwrap();
        let n = receive_within(&mut link, &mut buf).await.expect("reply");
        assert_eq!(&buf[..n], b"reply");
    }

    #[tokio::test]
    async fn test_udp_link_first_send_on_fresh_socket() {
        let device = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        device.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        let mut link = UdpLink::open("127.0.0.1:0", &device.local_addr().unwrap().to_string()).await.unwrap();

        link.send(b"first").unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = device.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"first");
    }

    #[tokio::test]
    async fn test_channel_open_rejects_bad_endpoint() {
        let cfg = DeviceConfig { endpoint: "nope".into(), bind: "127.0.0.1:0".into() };
        assert!(DeviceChannel::open(&cfg).await.is_err());
    }
}
