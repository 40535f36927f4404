/// Running checksum fed one byte at a time while a frame is assembled.
///
/// The decoder and the encoder are generic over this so a firmware revision
/// with a different trailer can be supported without touching the state machine.
pub trait FrameChecksum: Default {
    fn update(&mut self, byte: u8);
    fn value(&self) -> u16;

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Ping v1 trailer: wrapping 16-bit sum of every byte from the start marker
/// through the last payload byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteSum(u16);

impl FrameChecksum for ByteSum {
    #[inline]
    fn update(&mut self, byte: u8) {
        self.0 = self.0.wrapping_add(byte as u16);
    }

    #[inline]
    fn value(&self) -> u16 {
        self.0
    }
}

pub fn checksum_of<C: FrameChecksum>(data: &[u8]) -> u16 {
    let mut c = C::default();
    for &b in data {
        c.update(b);
    }
    c.value()
}
