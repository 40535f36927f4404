//! Ping sonar to autopilot rangefinder bridge.

pub mod doctor;
pub mod scheduler;

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::Result;
use ping_fc::TelemetrySink;
use ping_link::DeviceLink;
use serde::Deserialize;
use tracing::info;

pub use scheduler::{distance_report, BridgeScheduler, BridgeStats, DISTANCE_SCALE};

/// `[bridge]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Readings below this confidence (percent) are forwarded with distance 0.
    pub min_confidence: u8,

    /// Request spacing, and how long the device may stay quiet before we ask.
    pub poll_interval_ms: u64,

    /// Sleep between loop iterations.
    pub idle_sleep_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0,
            poll_interval_ms: 75,
            idle_sleep_ms: 1,
        }
    }
}

impl BridgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }
}

/// Drive the scheduler until `shutdown` resolves or the device link breaks.
pub async fn run<D, T, F>(mut scheduler: BridgeScheduler<D, T>, idle_sleep: Duration, shutdown: F) -> Result<BridgeStats>
where
    D: DeviceLink,
    T: TelemetrySink,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!("bridge: running");

    loop {
        scheduler.step(Instant::now())?;

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(idle_sleep) => {}
        }
    }

    let stats = scheduler.stats();
    info!(
        "bridge: stopped (requests={} forwarded={} invalid={} ignored={})",
        stats.requests_sent, stats.measurements_forwarded, stats.invalid_frames, stats.ignored_frames
    );
    Ok(stats)
}
