//! Ping1D message ids and the payload fields the bridge reads.

use std::time::Duration;

use crate::frame::Frame;

pub mod ids {
    pub const ACK: u16 = 1;
    pub const NACK: u16 = 2;
    pub const ASCII_TEXT: u16 = 3;
    pub const GENERAL_REQUEST: u16 = 6;

    pub const FIRMWARE_VERSION: u16 = 1200;
    pub const DEVICE_ID: u16 = 1201;
    pub const DISTANCE_SIMPLE: u16 = 1211;
    pub const DISTANCE: u16 = 1212;
    pub const PROFILE: u16 = 1300;
}

/// Messages whose payload starts with the current distance and confidence.
pub const DISTANCE_MESSAGES: [u16; 3] = [ids::DISTANCE, ids::DISTANCE_SIMPLE, ids::PROFILE];

pub fn is_distance_message(message_id: u16) -> bool {
    DISTANCE_MESSAGES.contains(&message_id)
}

/// Messages the bridge knows how to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    DistanceSimple,
    Distance,
    Profile,
    DeviceId,
    FirmwareVersion,
}

impl RequestKind {
    pub const fn message_id(self) -> u16 {
        match self {
            RequestKind::DistanceSimple => ids::DISTANCE_SIMPLE,
            RequestKind::Distance => ids::DISTANCE,
            RequestKind::Profile => ids::PROFILE,
            RequestKind::DeviceId => ids::DEVICE_ID,
            RequestKind::FirmwareVersion => ids::FIRMWARE_VERSION,
        }
    }
}

/// A distance reading pulled out of a distance-bearing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub distance_mm: u32,
    pub confidence_pct: u8,
    pub device_id: u8,
    /// Time since the bridge started when the frame was decoded.
    pub timestamp: Duration,
}

impl Measurement {
    /// Returns `None` for frames that are not distance-bearing or whose
    /// payload is too short to hold the distance fields.
    pub fn from_frame(frame: &Frame, timestamp: Duration) -> Option<Self> {
        let p = frame.payload.as_ref();
        let distance_mm = u32::from_le_bytes(p.get(0..4)?.try_into().ok()?);

        let confidence_pct = match frame.message_id {
            // distance u32, confidence u8
            ids::DISTANCE_SIMPLE => *p.get(4)?,
            // distance u32, confidence u16, transmit_duration u16, ...
            ids::DISTANCE | ids::PROFILE => {
                let c = u16::from_le_bytes(p.get(4..6)?.try_into().ok()?);
                c.min(u8::MAX as u16) as u8
            }
            _ => return None,
        };

        Some(Self {
            distance_mm,
            confidence_pct,
            device_id: frame.src_device_id,
            timestamp,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub device_type: u8,
    pub device_model: u8,
    pub major: u16,
    pub minor: u16,
}

impl FirmwareVersion {
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if frame.message_id != ids::FIRMWARE_VERSION {
            return None;
        }
        let p = frame.payload.as_ref();
        Some(Self {
            device_type: *p.first()?,
            device_model: *p.get(1)?,
            major: u16::from_le_bytes(p.get(2..4)?.try_into().ok()?),
            minor: u16::from_le_bytes(p.get(4..6)?.try_into().ok()?),
        })
    }
}

/// What a probe learned about a sonar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: u8,
    pub firmware: FirmwareVersion,
}

impl DeviceInfo {
    /// e.g. `Ping1D-id-43-t-1-m-1-v-3.19`
    pub fn describe(&self) -> String {
        format!(
            "Ping1D-id-{}-t-{}-m-{}-v-{}.{}",
            self.device_id,
            self.firmware.device_type,
            self.firmware.device_model,
            self.firmware.major,
            self.firmware.minor
        )
    }
}

pub fn parse_device_id(frame: &Frame) -> Option<u8> {
    if frame.message_id != ids::DEVICE_ID {
        return None;
    }
    frame.payload.first().copied()
}
