mod config;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use ping_bridge::{doctor as bridge_doctor, BridgeScheduler};
use ping_fc::TelemetryChannel;
use ping_link::{doctor as link_doctor, probe::probe_device, DeviceChannel};

use crate::config::{load_config, Config, Overrides};

#[derive(Debug, Parser)]
#[command(name = "pingbridge", version, about = "Ping1D sonar to MAVLink rangefinder bridge")]
struct Cli {
    /// Optional TOML config; flags below override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ping device address, e.g. "0.0.0.0:9090" or "serial:/dev/ttyUSB0:115200".
    #[arg(long, global = true)]
    ping: Option<String>,

    /// MAVLink address, e.g. "0.0.0.0:9000".
    #[arg(long, global = true)]
    mavlink: Option<String>,

    /// Minimum acceptable confidence percentage for depth measurements.
    #[arg(long, global = true)]
    min_confidence: Option<u8>,

    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bridge distance readings to the autopilot (default).
    Run,
    /// Validate configuration.
    Doctor,
    /// Ask the sonar for its device id and firmware version.
    Probe,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?.apply(Overrides {
        ping: cli.ping,
        mavlink: cli.mavlink,
        min_confidence: cli.min_confidence,
        poll_interval_ms: cli.poll_interval_ms,
    });

    match cli.cmd.unwrap_or(Command::Run) {
        Command::Run => run(&cfg).await?,
        Command::Doctor => doctor(&cfg)?,
        Command::Probe => probe(&cfg).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    let endpoint = link_doctor::check_device(&cfg.device)?;
    info!("doctor: device {}", endpoint);
    bridge_doctor::check_bridge(&cfg.bridge)?;
    anyhow::ensure!(!cfg.mavlink.endpoint.trim().is_empty(), "mavlink.endpoint missing");
    anyhow::ensure!(cfg.probe.timeout_ms > 0, "probe.timeout_ms must be > 0");

    info!("doctor: OK");
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    doctor(cfg)?;
    info!(
        "run: min_confidence={}% poll_interval={}ms",
        cfg.bridge.min_confidence, cfg.bridge.poll_interval_ms
    );

    let device = DeviceChannel::open(&cfg.device).await.context("device open")?;
    let telemetry = TelemetryChannel::open(&cfg.mavlink).context("telemetry open")?;
    let scheduler = BridgeScheduler::new(device, telemetry, &cfg.bridge, Instant::now());

    ping_bridge::run(scheduler, cfg.bridge.idle_sleep(), shutdown_signal()).await?;
    Ok(())
}

async fn probe(cfg: &Config) -> Result<()> {
    link_doctor::check_device(&cfg.device)?;
    let mut device = DeviceChannel::open(&cfg.device).await.context("device open")?;
    let info = probe_device(
        &mut device,
        Duration::from_millis(cfg.probe.timeout_ms),
        cfg.bridge.poll_interval(),
    )
    .await?;
    println!("{}", info.describe());
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("ctrl-c handler unavailable: {:#}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
