//! Frame layout and encoding.
//!
//! ```text
//! ┌──────┬─────────┬────────────┬─────┬─────┬─────────┬──────────┐
//! │ "BR" │ len u16 │ msg id u16 │ src │ dst │ payload │ checksum │
//! │  2   │    2    │     2      │  1  │  1  │   len   │  u16 LE  │
//! └──────┴─────────┴────────────┴─────┴─────┴─────────┴──────────┘
//! ```
//!
//! All multi-byte fields are little endian.

use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::{checksum_of, ByteSum, FrameChecksum};
use crate::messages::RequestKind;

pub const START_1: u8 = b'B';
pub const START_2: u8 = b'R';

/// Start marker through destination id.
pub const HEADER_LEN: usize = 8;
pub const CHECKSUM_LEN: usize = 2;

/// Largest payload the decoder will buffer. Longer length fields are treated
/// as line noise.
pub const MAX_PAYLOAD_LEN: usize = 8192;

/// One complete, checksum-validated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message_id: u16,
    pub src_device_id: u8,
    pub dst_device_id: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(message_id: u16, src_device_id: u8, dst_device_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            message_id,
            src_device_id,
            dst_device_id,
            payload: payload.into(),
        }
    }

    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + CHECKSUM_LEN
    }

    /// Serialize with the standard Ping trailer.
    pub fn encode(&self) -> Bytes {
        self.encode_with::<ByteSum>()
    }

    pub fn encode_with<C: FrameChecksum>(&self) -> Bytes {
        debug_assert!(self.payload.len() <= MAX_PAYLOAD_LEN, "payload too large to frame");

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u8(START_1);
        buf.put_u8(START_2);
        buf.put_u16_le(self.payload.len() as u16);
        buf.put_u16_le(self.message_id);
        buf.put_u8(self.src_device_id);
        buf.put_u8(self.dst_device_id);
        buf.put_slice(&self.payload);

        let sum = checksum_of::<C>(&buf);
        buf.put_u16_le(sum);
        buf.freeze()
    }
}

/// Build the zero-payload frame that asks the device to emit `request`.
pub fn encode_request(request: RequestKind, src_device_id: u8) -> Bytes {
    Frame::new(request.message_id(), src_device_id, 0, Bytes::new()).encode()
}
