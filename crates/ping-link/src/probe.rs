use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ping_proto::messages::{ids, parse_device_id};
use ping_proto::{encode_request, Decoder, DeviceInfo, FirmwareVersion, RequestKind};
use tracing::{debug, info, warn};

use crate::device::DeviceLink;

const PROBE_POLL: Duration = Duration::from_millis(10);

/// Ask the sonar who it is. Requests are repeated every `retry` until both
/// the device id and the firmware version have been heard or `timeout` expires.
pub async fn probe_device<L: DeviceLink>(link: &mut L, timeout: Duration, retry: Duration) -> Result<DeviceInfo> {
    let start = Instant::now();
    let mut decoder = Decoder::new();
    let mut buf = [0u8; 4096];

    let mut device_id: Option<u8> = None;
    let mut firmware: Option<FirmwareVersion> = None;
    let mut last_request: Option<Instant> = None;

    loop {
        if let (Some(device_id), Some(firmware)) = (device_id, firmware) {
            let info = DeviceInfo { device_id, firmware };
            info!("probe: found {} after {}ms", info.describe(), start.elapsed().as_millis());
            return Ok(info);
        }

        if start.elapsed() >= timeout {
            anyhow::bail!(
                "no answer from device within {}ms (device_id={}, firmware_version={})",
                timeout.as_millis(),
                if device_id.is_some() { "ok" } else { "missing" },
                if firmware.is_some() { "ok" } else { "missing" },
            );
        }

        if last_request.map_or(true, |t| t.elapsed() >= retry) {
            let mut pending = Vec::new();
            if device_id.is_none() {
                pending.push(RequestKind::DeviceId);
            }
            if firmware.is_none() {
                pending.push(RequestKind::FirmwareVersion);
            }
            for kind in pending {
                if let Err(e) = link.send(&encode_request(kind, 0)) {
                    warn!("probe: request {:?} failed: {:#}", kind, e);
                }
            }
            last_request = Some(Instant::now());
        }

        while let Some(n) = link.try_receive(&mut buf).context("device link failed")? {
            for frame in decoder.frames(&buf[..n]) {
                match frame.message_id {
                    ids::DEVICE_ID => device_id = device_id.or(parse_device_id(&frame)),
                    ids::FIRMWARE_VERSION => firmware = firmware.or(FirmwareVersion::from_frame(&frame)),
                    ids::NACK => debug!("probe: device nacked a request ({} byte payload)", frame.payload.len()),
                    other => debug!("probe: ignoring message {}", other),
                }
            }
        }

        tokio::time::sleep(PROBE_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ping_proto::{DecodeResult, Frame};
    use std::collections::VecDeque;
    use std::io;

    /// Answers device_id / firmware_version requests like a Ping1D would.
    #[derive(Default)]
    struct FakeSonar {
        decoder: Decoder,
        outbox: VecDeque<Vec<u8>>,
        silent: bool,
        requests: usize,
    }

    impl DeviceLink for FakeSonar {
        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            for &b in bytes {
                if let DecodeResult::Complete(req) = self.decoder.decode_byte(b) {
                    self.requests += 1;
                    if self.silent {
                        continue;
                    }
                    let reply = match req.message_id {
                        ids::DEVICE_ID => Frame::new(ids::DEVICE_ID, 43, 0, vec![43]),
                        ids::FIRMWARE_VERSION => Frame::new(ids::FIRMWARE_VERSION, 43, 0, vec![1, 1, 3, 0, 29, 0]),
                        _ => continue,
                    };
                    self.outbox.push_back(reply.encode().to_vec());
                }
            }
            Ok(())
        }

        fn try_receive(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
            Ok(self.outbox.pop_front().map(|d| {
                buf[..d.len()].copy_from_slice(&d);
                d.len()
            }))
        }
    }

    #[tokio::test]
    async fn test_probe_reads_identity() {
        let mut sonar = FakeSonar::default();
        let info = probe_device(&mut sonar, Duration::from_millis(500), Duration::from_millis(75))
            .await
            .unwrap();
        assert_eq!(info.device_id, 43);
        assert_eq!(info.describe(), "Ping1D-id-43-t-1-m-1-v-3.29");
        assert_eq!(sonar.requests, 2);
    }

    #[tokio::test]
    async fn test_probe_times_out_and_retries() {
        let mut sonar = FakeSonar { silent: true, ..Default::default() };
        let err = probe_device(&mut sonar, Duration::from_millis(120), Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no answer"));
        assert!(sonar.requests >= 4, "requests={}", sonar.requests);
    }
}
