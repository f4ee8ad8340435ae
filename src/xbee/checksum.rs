//! # XBee API Checksum
//!
//! The checksum byte is `0xFF` minus the low byte of the sum of every frame
//! byte between the length field and the checksum (frame type included). A
//! frame is valid when the same sum including the checksum byte is `0xFF`.

/// Calculate the API frame checksum over frame type + frame data
///
/// # Examples
///
/// ```
/// use xbee_beacon::xbee::checksum::api_checksum;
///
/// // AT command "NJ" with frame id 1
/// assert_eq!(api_checksum(&[0x08, 0x01, b'N', b'J']), 0x5E);
/// ```
pub fn api_checksum(data: &[u8]) -> u8 {
    0xFF - sum(data)
}

/// Verify frame type + frame data against a received checksum byte
pub fn verify_api_checksum(data: &[u8], checksum: u8) -> bool {
    sum(data).wrapping_add(checksum) == 0xFF
}

fn sum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}
