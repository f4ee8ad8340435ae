//! # XBee API Frame Encoder
//!
//! Builds transmit request and local AT command frames.

use super::checksum::api_checksum;
use super::protocol::*;

/// Wrap frame type + frame data into a complete API frame
///
/// # Arguments
///
/// * `body` - Frame type byte followed by the frame data
///
/// # Returns
///
/// * `Vec<u8>` - `0x7E | length | body | checksum`
///
/// # Examples
///
/// ```
/// use xbee_beacon::xbee::encoder::encode_api_frame;
///
/// let frame = encode_api_frame(&[0x08, 0x01, b'N', b'J']);
/// assert_eq!(frame, vec![0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x4A, 0x5E]);
/// ```
pub fn encode_api_frame(body: &[u8]) -> Vec<u8> {
    let length = body.len() as u16;

    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.push(XBEE_START_DELIMITER);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(body);
    frame.push(api_checksum(body));

    frame
}

/// Encode a transmit request carrying `payload` to the given addresses
///
/// # Arguments
///
/// * `frame_id` - Transmit status correlation id (0 suppresses the status frame)
/// * `dest_address` - 64-bit destination (see [`XBEE_BROADCAST_ADDRESS`],
///   [`XBEE_COORDINATOR_ADDRESS`])
/// * `dest_network_address` - 16-bit destination, or [`XBEE_UNKNOWN_NETWORK_ADDRESS`]
/// * `payload` - RF data
///
/// Broadcast radius and transmit options are left at the module defaults (0).
pub fn encode_transmit_request(
    frame_id: u8,
    dest_address: u64,
    dest_network_address: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(14 + payload.len());
    body.push(XBEE_FRAMETYPE_TRANSMIT_REQUEST);
    body.push(frame_id);
    body.extend_from_slice(&dest_address.to_be_bytes());
    body.extend_from_slice(&dest_network_address.to_be_bytes());
    body.push(0x00); // broadcast radius
    body.push(0x00); // options
    body.extend_from_slice(payload);

    encode_api_frame(&body)
}

/// Encode a local AT command with an optional parameter value
pub fn encode_at_command(frame_id: u8, command: [u8; 2], parameter: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + parameter.len());
    body.push(XBEE_FRAMETYPE_AT_COMMAND);
    body.push(frame_id);
    body.extend_from_slice(&command);
    body.extend_from_slice(parameter);

    encode_api_frame(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xbee::decoder::ApiFrameDecoder;

    #[test]
    fn test_encode_at_command_reference_frame() {
        let frame = encode_at_command(0x01, *b"NJ", &[]);
        assert_eq!(frame, vec![0x7E, 0x00, 0x04, 0x08, 0x01, 0x4E, 0x4A, 0x5E]);
    }

    #[test]
    fn test_encode_at_command_with_parameter() {
        let frame = encode_at_command(0x05, *b"NJ", &[30]);
        assert_eq!(&frame[1..3], &[0x00, 0x05]);
        assert_eq!(&frame[5..8], &[b'N', b'J', 30]);
    }

    #[test]
    fn test_encode_transmit_request_layout() {
        let frame = encode_transmit_request(0x00, XBEE_BROADCAST_ADDRESS, XBEE_UNKNOWN_NETWORK_ADDRESS, &[0xAA]);

        // 0x10 + id + 8 + 2 + radius + options + payload
        assert_eq!(frame.len(), 4 + 15);
        assert_eq!(frame[3], XBEE_FRAMETYPE_TRANSMIT_REQUEST);
        assert_eq!(&frame[5..13], &[0, 0, 0, 0, 0, 0, 0xFF, 0xFF]);
        assert_eq!(&frame[13..15], &[0xFF, 0xFE]);
        assert_eq!(frame[17], 0xAA);
    }

    #[test]
    fn test_encode_transmit_request_unicast_address() {
        let frame = encode_transmit_request(0x01, 0x0013_A200_4000_0001, 0x1234, &[]);
        assert_eq!(&frame[5..13], &[0x00, 0x13, 0xA2, 0x00, 0x40, 0x00, 0x00, 0x01]);
        assert_eq!(&frame[13..15], &[0x12, 0x34]);
    }

    #[test]
    fn test_encoded_frames_decode() {
        let frame = encode_transmit_request(0x00, XBEE_COORDINATOR_ADDRESS, XBEE_UNKNOWN_NETWORK_ADDRESS, b"hello");
        let mut decoder = ApiFrameDecoder::new();

        let mut decoded = None;
        for &b in &frame {
            if let Some(f) = decoder.push(b) {
                decoded = Some((f.frame_type, f.data.to_vec()));
            }
        }

        let (frame_type, data) = decoded.expect("frame should decode");
        assert_eq!(frame_type, XBEE_FRAMETYPE_TRANSMIT_REQUEST);
        assert!(data.ends_with(b"hello"));
    }
}
