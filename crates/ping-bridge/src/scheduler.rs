use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ping_fc::{DistanceReport, TelemetrySink};
use ping_link::DeviceLink;
use ping_proto::messages::is_distance_message;
use ping_proto::{encode_request, DecodeResult, Decoder, Frame, Measurement, RequestKind};
use tracing::{debug, trace, warn};

use crate::BridgeConfig;

/// Sonar reports millimetres, DISTANCE_SENSOR wants centimetres.
pub const DISTANCE_SCALE: u32 = 10;

const RX_BUFFER_SIZE: usize = 4096;

/// Reads per `step`, so a flooding device cannot starve request gating.
pub const MAX_READS_PER_STEP: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub requests_sent: u64,
    pub request_failures: u64,
    pub frames_decoded: u64,
    pub invalid_frames: u64,
    pub ignored_frames: u64,
    pub measurements_forwarded: u64,
    pub telemetry_failures: u64,
}

/// `None` means "never", which counts as a full interval ago.
#[derive(Debug, Clone, Copy, Default)]
struct SchedulerClock {
    last_request: Option<Instant>,
    last_measurement: Option<Instant>,
}

impl SchedulerClock {
    fn elapsed(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
        match last {
            Some(t) => now.saturating_duration_since(t) >= interval,
            None => true,
        }
    }

    fn request_due(&self, now: Instant, interval: Duration) -> bool {
        Self::elapsed(self.last_measurement, now, interval) && Self::elapsed(self.last_request, now, interval)
    }
}

/// Zero the distance when confidence is under the threshold, then scale to
/// centimetres. The report is produced either way.
pub fn distance_report(m: &Measurement, min_confidence: u8) -> DistanceReport {
    let distance_mm = if m.confidence_pct < min_confidence { 0 } else { m.distance_mm };
    DistanceReport {
        time_boot_ms: m.timestamp.as_millis() as u32,
        distance_cm: (distance_mm / DISTANCE_SCALE).min(u16::MAX as u32) as u16,
        device_id: m.device_id,
    }
}

/// Polls one sonar and forwards its distance readings to the autopilot.
///
/// A request is only sent when no distance has arrived for a full poll
/// interval and we have not ourselves asked within the last interval, so the
/// bridge stays quiet while another client is already polling the device.
pub struct BridgeScheduler<D, T> {
    device: D,
    telemetry: T,
    decoder: Decoder,
    clock: SchedulerClock,
    started: Instant,
    poll_interval: Duration,
    min_confidence: u8,
    rx: Vec<u8>,
    stats: BridgeStats,
}

impl<D: DeviceLink, T: TelemetrySink> BridgeScheduler<D, T> {
    /// Neither timer has fired yet, so the first `step` sends a request.
    pub fn new(device: D, telemetry: T, cfg: &BridgeConfig, started: Instant) -> Self {
        Self {
            device,
            telemetry,
            decoder: Decoder::new(),
            clock: SchedulerClock::default(),
            started,
            poll_interval: cfg.poll_interval(),
            min_confidence: cfg.min_confidence,
            rx: vec![0u8; RX_BUFFER_SIZE],
            stats: BridgeStats::default(),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// One loop iteration. Only a broken device link is an error.
    pub fn step(&mut self, now: Instant) -> Result<()> {
        self.maybe_request(now);

        for _ in 0..MAX_READS_PER_STEP {
            let n = match self.device.try_receive(&mut self.rx).context("device channel failed")? {
                Some(n) => n,
                None => break,
            };

            let invalid_before = self.stats.invalid_frames;
            for i in 0..n {
                let byte = self.rx[i];
                self.ingest(byte, now);
            }
            if self.stats.invalid_frames != invalid_before {
                trace!("rx chunk with invalid frame: {}", hex::encode(&self.rx[..n]));
            }
        }
        Ok(())
    }

    fn maybe_request(&mut self, now: Instant) {
        if !self.clock.request_due(now, self.poll_interval) {
            return;
        }

        self.clock.last_request = Some(now);
        match self.device.send(&encode_request(RequestKind::DistanceSimple, 0)) {
            Ok(()) => self.stats.requests_sent += 1,
            Err(e) => {
                self.stats.request_failures += 1;
                warn!("device request failed: {:#}", e);
            }
        }
    }

    fn ingest(&mut self, byte: u8, now: Instant) {
        match self.decoder.decode_byte(byte) {
            DecodeResult::Incomplete => {}
            DecodeResult::Invalid(reason) => {
                self.stats.invalid_frames += 1;
                debug!("dropped frame: {:?}", reason);
            }
            DecodeResult::Complete(frame) => {
                self.stats.frames_decoded += 1;
                self.on_frame(frame, now);
            }
        }
    }

    fn on_frame(&mut self, frame: Frame, now: Instant) {
        if !is_distance_message(frame.message_id) {
            self.stats.ignored_frames += 1;
            debug!("ignoring message {} from device {}", frame.message_id, frame.src_device_id);
            return;
        }
        self.clock.last_measurement = Some(now);

        let since_start = now.saturating_duration_since(self.started);
        let Some(m) = Measurement::from_frame(&frame, since_start) else {
            self.stats.ignored_frames += 1;
            debug!("message {} payload too short ({} bytes)", frame.message_id, frame.payload.len());
            return;
        };

        let report = distance_report(&m, self.min_confidence);
        debug!(
            "distance {}mm confidence {}% device {} -> {}cm",
            m.distance_mm, m.confidence_pct, m.device_id, report.distance_cm
        );
        match self.telemetry.send_distance(&report) {
            Ok(()) => self.stats.measurements_forwarded += 1,
            Err(e) => {
                self.stats.telemetry_failures += 1;
                warn!("telemetry send failed: {:#}", e);
            }
        }
    }
}
