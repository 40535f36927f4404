use anyhow::Result;

use crate::BridgeConfig;

pub fn check_bridge(cfg: &BridgeConfig) -> Result<()> {
    anyhow::ensure!(cfg.min_confidence <= 100, "bridge.min_confidence must be 0..=100");
    anyhow::ensure!(cfg.poll_interval_ms >= 1, "bridge.poll_interval_ms must be >= 1");
    anyhow::ensure!(
        cfg.idle_sleep_ms < cfg.poll_interval_ms,
        "bridge.idle_sleep_ms must be shorter than poll_interval_ms"
    );
    Ok(())
}
