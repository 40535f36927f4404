//! Byte-at-a-time frame decoder.
//!
//! The decoder is fed one byte per call and never fails: every byte yields
//! [`DecodeResult::Incomplete`], a finished [`Frame`], or
//! [`DecodeResult::Invalid`]. Frames may be split over any number of reads,
//! so the same decoder serves datagram and serial byte-stream sources.
//!
//! On a structural mismatch the state is reset in place rather than
//! recreated, and a byte that breaks the start marker is re-examined as the
//! possible start of the next frame.

use bytes::BytesMut;

use crate::checksum::{ByteSum, FrameChecksum};
use crate::frame::{Frame, MAX_PAYLOAD_LEN, START_1, START_2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    SeekStart1,
    SeekStart2,
    LengthLo,
    LengthHi,
    MessageIdLo,
    MessageIdHi,
    SourceId,
    DestinationId,
    Payload,
    ChecksumLo,
    ChecksumHi,
}

/// Why a candidate frame was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidFrame {
    Checksum { expected: u16, received: u16 },
    Oversize { payload_len: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeResult {
    Incomplete,
    Complete(Frame),
    Invalid(InvalidFrame),
}

#[derive(Debug)]
pub struct Decoder<C = ByteSum> {
    stage: Stage,
    payload_len: u16,
    message_id: u16,
    src_device_id: u8,
    dst_device_id: u8,
    payload: BytesMut,
    received_checksum: u16,
    sum: C,
}

impl Decoder<ByteSum> {
    pub fn new() -> Self {
        Self::with_checksum()
    }
}

impl Default for Decoder<ByteSum> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: FrameChecksum> Decoder<C> {
    pub fn with_checksum() -> Self {
        Self {
            stage: Stage::SeekStart1,
            payload_len: 0,
            message_id: 0,
            src_device_id: 0,
            dst_device_id: 0,
            payload: BytesMut::new(),
            received_checksum: 0,
            sum: C::default(),
        }
    }

    /// True while no partial frame is buffered.
    pub fn is_seeking(&self) -> bool {
        self.stage == Stage::SeekStart1
    }

    pub fn reset(&mut self) {
        self.stage = Stage::SeekStart1;
        self.payload_len = 0;
        self.payload.clear();
        self.sum.reset();
    }

    pub fn decode_byte(&mut self, byte: u8) -> DecodeResult {
        match self.stage {
            Stage::SeekStart1 => {
                if byte == START_1 {
                    self.sum.reset();
                    self.sum.update(byte);
                    self.stage = Stage::SeekStart2;
                }
            }
            Stage::SeekStart2 => {
                if byte == START_2 {
                    self.sum.update(byte);
                    self.stage = Stage::LengthLo;
                } else {
                    // "BB R..." must still sync on the second 'B'
                    self.reset();
                    return self.decode_byte(byte);
                }
            }
            Stage::LengthLo => {
                self.sum.update(byte);
                self.payload_len = byte as u16;
                self.stage = Stage::LengthHi;
            }
            Stage::LengthHi => {
                self.sum.update(byte);
                self.payload_len |= (byte as u16) << 8;
                if self.payload_len as usize > MAX_PAYLOAD_LEN {
                    let payload_len = self.payload_len;
                    self.reset();
                    return DecodeResult::Invalid(InvalidFrame::Oversize { payload_len });
                }
                self.payload.clear();
                self.payload.reserve(self.payload_len as usize);
                self.stage = Stage::MessageIdLo;
            }
            Stage::MessageIdLo => {
                self.sum.update(byte);
                self.message_id = byte as u16;
                self.stage = Stage::MessageIdHi;
            }
            Stage::MessageIdHi => {
                self.sum.update(byte);
                self.message_id |= (byte as u16) << 8;
                self.stage = Stage::SourceId;
            }
            Stage::SourceId => {
                self.sum.update(byte);
                self.src_device_id = byte;
                self.stage = Stage::DestinationId;
            }
            Stage::DestinationId => {
                self.sum.update(byte);
                self.dst_device_id = byte;
                self.stage = if self.payload_len == 0 { Stage::ChecksumLo } else { Stage::Payload };
            }
            Stage::Payload => {
                self.sum.update(byte);
                self.payload.extend_from_slice(&[byte]);
                if self.payload.len() == self.payload_len as usize {
                    self.stage = Stage::ChecksumLo;
                }
            }
            Stage::ChecksumLo => {
                self.received_checksum = byte as u16;
                self.stage = Stage::ChecksumHi;
            }
            Stage::ChecksumHi => {
                self.received_checksum |= (byte as u16) << 8;
                let expected = self.sum.value();
                let received = self.received_checksum;
                self.stage = Stage::SeekStart1;
                self.sum.reset();

                if expected != received {
                    self.payload.clear();
                    return DecodeResult::Invalid(InvalidFrame::Checksum { expected, received });
                }
                return DecodeResult::Complete(Frame {
                    message_id: self.message_id,
                    src_device_id: self.src_device_id,
                    dst_device_id: self.dst_device_id,
                    payload: self.payload.split().freeze(),
                });
            }
        }
        DecodeResult::Incomplete
    }

    /// Feed a whole chunk, keeping only the completed frames.
    pub fn frames<'a>(&'a mut self, chunk: &'a [u8]) -> impl Iterator<Item = Frame> + 'a {
        chunk.iter().filter_map(move |&b| match self.decode_byte(b) {
            DecodeResult::Complete(frame) => Some(frame),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_request;
    use crate::messages::{ids, RequestKind};
    use proptest::prelude::*;

    fn feed(dec: &mut Decoder, bytes: &[u8]) -> Vec<DecodeResult> {
        bytes.iter().map(|&b| dec.decode_byte(b)).collect()
    }

    fn completes(results: &[DecodeResult]) -> Vec<Frame> {
        results
            .iter()
            .filter_map(|r| match r {
                DecodeResult::Complete(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    fn distance_simple_bytes(distance: u32, confidence: u8, src: u8) -> Vec<u8> {
        let mut payload = distance.to_le_bytes().to_vec();
        payload.push(confidence);
        Frame::new(ids::DISTANCE_SIMPLE, src, 0, payload).encode().to_vec()
    }

    #[test]
    fn test_decode_request_frame() {
        let mut dec = Decoder::new();
        let bytes = encode_request(RequestKind::DistanceSimple, 0);
        let results = feed(&mut dec, &bytes);

        let (last, rest) = results.split_last().unwrap();
        assert!(rest.iter().all(|r| *r == DecodeResult::Incomplete));
        match last {
            DecodeResult::Complete(f) => {
                assert_eq!(f.message_id, ids::DISTANCE_SIMPLE);
                assert!(f.payload.is_empty());
            }
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(dec.is_seeking());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut dec = Decoder::new();
        let mut bytes = distance_simple_bytes(5000, 80, 1);
        bytes.extend(distance_simple_bytes(6000, 90, 2));
        let frames = completes(&feed(&mut dec, &bytes));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].src_device_id, 1);
        assert_eq!(frames[1].src_device_id, 2);
    }

    #[test]
    fn test_checksum_mismatch_is_invalid_and_recovers() {
        let mut dec = Decoder::new();
        let mut bad = distance_simple_bytes(5000, 80, 1);
        let n = bad.len();
        bad[n - 1] ^= 0x01;
        let results = feed(&mut dec, &bad);
        assert!(matches!(
            results.last(),
            Some(DecodeResult::Invalid(InvalidFrame::Checksum { .. }))
        ));
        assert!(completes(&results).is_empty());
        assert!(dec.is_seeking());

        let good = distance_simple_bytes(5000, 80, 1);
        assert_eq!(completes(&feed(&mut dec, &good)).len(), 1);
    }

    #[test]
    fn test_oversize_length_is_invalid() {
        let mut dec = Decoder::new();
        let len = (MAX_PAYLOAD_LEN as u16 + 1).to_le_bytes();
        let results = feed(&mut dec, &[b'B', b'R', len[0], len[1]]);
        assert!(matches!(
            results.last(),
            Some(DecodeResult::Invalid(InvalidFrame::Oversize { .. }))
        ));
        assert!(dec.is_seeking());
    }

    #[test]
    fn test_repeated_start_byte_keeps_sync() {
        let mut dec = Decoder::new();
        let mut bytes = vec![b'B'];
        bytes.extend(distance_simple_bytes(100, 50, 4));
        let frames = completes(&feed(&mut dec, &bytes));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].src_device_id, 4);
    }

    #[test]
    fn test_frames_iterator_across_chunks() {
        let mut dec = Decoder::new();
        let bytes = distance_simple_bytes(42, 10, 9);
        let (a, b) = bytes.split_at(3);
        assert_eq!(dec.frames(a).count(), 0);
        let frames: Vec<_> = dec.frames(b).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[42, 0, 0, 0, 10]);
    }

    proptest! {
        #[test]
        fn prop_round_trip_any_chunking(
            message_id in any::<u16>(),
            src in any::<u8>(),
            payload in proptest::collection::vec(any::<u8>(), 0..512),
            cuts in proptest::collection::vec(any::<usize>(), 0..16),
        ) {
            let frame = Frame::new(message_id, src, 0, payload);
            let bytes = frame.encode();

            let mut points: Vec<usize> = cuts.iter().map(|c| c % (bytes.len() + 1)).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();

            let mut dec = Decoder::new();
            let mut results = Vec::new();
            for w in points.windows(2) {
                for &b in &bytes[w[0]..w[1]] {
                    results.push(dec.decode_byte(b));
                }
            }

            let (last, rest) = results.split_last().unwrap();
            prop_assert!(rest.iter().all(|r| *r == DecodeResult::Incomplete));
            prop_assert_eq!(last, &DecodeResult::Complete(frame));
        }

        #[test]
        fn prop_resync_after_garbage(
            garbage in proptest::collection::vec(any::<u8>(), 0..256),
            distance in any::<u32>(),
            confidence in any::<u8>(),
        ) {
            let good = distance_simple_bytes(distance, confidence, 1);
            // Garbage ending in a partial header could swallow the frame's
            // preamble; a run of zeros flushes any pending length field.
            let mut bytes = garbage;
            bytes.extend(std::iter::repeat(0u8).take(MAX_PAYLOAD_LEN + 16));
            bytes.extend_from_slice(&good);

            let mut dec = Decoder::new();
            let results = feed(&mut dec, &bytes);
            let frames = completes(&results);
            prop_assert_eq!(frames.len(), 1);
            prop_assert_eq!(frames[0].encode().to_vec(), good);
            prop_assert_eq!(results.last(), Some(&DecodeResult::Complete(frames[0].clone())));
        }

        #[test]
        fn prop_frame_directly_after_garbage(
            garbage in proptest::collection::vec(any::<u8>().prop_filter("no start byte", |b| *b != START_1), 0..256),
            trailing_start in any::<bool>(),
            distance in any::<u32>(),
            confidence in any::<u8>(),
        ) {
            let good = distance_simple_bytes(distance, confidence, 1);
            let mut bytes = garbage;
            if trailing_start {
                bytes.push(START_1);
            }
            bytes.extend_from_slice(&good);

            let mut dec = Decoder::new();
            let results = feed(&mut dec, &bytes);
            let (last, rest) = results.split_last().unwrap();
            prop_assert!(rest.iter().all(|r| *r == DecodeResult::Incomplete));
            match last {
                DecodeResult::Complete(frame) => prop_assert_eq!(frame.encode().to_vec(), good),
                other => prop_assert!(false, "expected a frame, got {:?}", other),
            }
        }

        #[test]
        fn prop_single_bit_flip_is_rejected(
            payload in proptest::collection::vec(any::<u8>(), 1..64),
            pick in any::<usize>(),
            bit in 0u8..8,
        ) {
            let bytes = Frame::new(ids::DISTANCE, 1, 0, payload.clone()).encode().to_vec();
            // payload bytes and the two checksum bytes
            let start = 8;
            let span = payload.len() + 2;
            let idx = start + pick % span;

            let mut corrupted = bytes;
            corrupted[idx] ^= 1 << bit;

            let mut dec = Decoder::new();
            let results = feed(&mut dec, &corrupted);
            prop_assert!(completes(&results).is_empty());
            let is_checksum_error = matches!(
                results.last(),
                Some(DecodeResult::Invalid(InvalidFrame::Checksum { .. }))
            );
            prop_assert!(is_checksum_error);
        }
    }
}
