//! Rolling two-accumulator checksum over persisted parameter bytes.
//!
//! Both accumulators start at the storage layout version, so an image written
//! by a different layout version fails verification even if its bytes happen
//! to be self-consistent.

/// Running Fletcher-style checksum (`A += byte; B += A`, modulo 256)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamChecksum {
    a: u8,
    b: u8,
}

impl ParamChecksum {
    pub fn new(version: u8) -> Self {
        Self { a: version, b: version }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.a = self.a.wrapping_add(byte);
            self.b = self.b.wrapping_add(self.a);
        }
    }

    /// Checksum bytes in storage order (A, then B)
    pub fn bytes(&self) -> [u8; 2] {
        [self.a, self.b]
    }
}

/// Checksum of a whole byte block
///
/// # Examples
///
/// ```
/// use xbee_beacon::params::checksum::param_checksum;
///
/// assert_eq!(param_checksum(0, &[1, 2]), [3, 4]);
/// ```
pub fn param_checksum(version: u8, data: &[u8]) -> [u8; 2] {
    let mut checksum = ParamChecksum::new(version);
    checksum.update(data);
    checksum.bytes()
}
