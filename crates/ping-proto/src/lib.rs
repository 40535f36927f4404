//! Ping protocol v1 framing: request encoding, incremental decoding and
//! interpretation of the sonar messages the bridge cares about.

pub mod checksum;
pub mod decoder;
pub mod frame;
pub mod messages;

pub use checksum::{ByteSum, FrameChecksum};
pub use decoder::{DecodeResult, Decoder, InvalidFrame};
pub use frame::{encode_request, Frame};
pub use messages::{DeviceInfo, FirmwareVersion, Measurement, RequestKind};
