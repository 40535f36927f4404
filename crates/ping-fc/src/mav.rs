use anyhow::{Context, Result};
use mavlink::{
    common::{MavDistanceSensor, MavMessage, MavSensorOrientation, DISTANCE_SENSOR_DATA},
    MavConnection, MavHeader,
};
use tracing::info;

use crate::MavlinkConfig;

// Fixed DISTANCE_SENSOR fields for a downward-looking Ping1D.
pub const MIN_DISTANCE_CM: u16 = 20;
pub const MAX_DISTANCE_CM: u16 = 5000;
pub const SENSOR_TYPE: MavDistanceSensor = MavDistanceSensor::MAV_DISTANCE_SENSOR_INFRARED;
pub const ORIENTATION: MavSensorOrientation = MavSensorOrientation::MAV_SENSOR_ROTATION_PITCH_270;
pub const COVARIANCE: u8 = 0;

/// One rangefinder sample as the autopilot will see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistanceReport {
    pub time_boot_ms: u32,
    /// Centimetres. Zero means "no reliable reading".
    pub distance_cm: u16,
    pub device_id: u8,
}

impl DistanceReport {
    pub fn to_mavlink(&self) -> DISTANCE_SENSOR_DATA {
        DISTANCE_SENSOR_DATA {
            time_boot_ms: self.time_boot_ms,
            min_distance: MIN_DISTANCE_CM,
            max_distance: MAX_DISTANCE_CM,
            current_distance: self.distance_cm,
            mavtype: SENSOR_TYPE,
            id: self.device_id,
            orientation: ORIENTATION,
            covariance: COVARIANCE,
            ..DISTANCE_SENSOR_DATA::default()
        }
    }
}

/// Outbound side of the bridge.
pub trait TelemetrySink {
    fn send_distance(&mut self, report: &DistanceReport) -> Result<()>;
}

pub struct TelemetryChannel {
    conn: Box<dyn MavConnection<MavMessage> + Send>,
    hdr: MavHeader,
}

impl TelemetryChannel {
    pub fn open(cfg: &MavlinkConfig) -> Result<Self> {
        let url = cfg.connection_url();
        let conn = mavlink::connect::<MavMessage>(&url)
            .with_context(|| format!("mavlink connect {}", url))?;
        info!("telemetry: {} as sys={} comp={}", url, cfg.sys_id, cfg.comp_id);

        Ok(Self {
            conn,
            hdr: MavHeader { system_id: cfg.sys_id, component_id: cfg.comp_id, sequence: 0 },
        })
    }

    fn send(&mut self, msg: MavMessage) -> Result<()> {
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        self.conn.send(&self.hdr, &msg).context("mavlink send")?;
        Ok(())
    }
}

impl TelemetrySink for TelemetryChannel {
    fn send_distance(&mut self, report: &DistanceReport) -> Result<()> {
        self.send(MavMessage::DISTANCE_SENSOR(report.to_mavlink()))
    }
}
