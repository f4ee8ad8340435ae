//! # XBee API Frame Decoder
//!
//! Incremental byte-wise decoding of API frames from the radio's serial
//! stream, plus parsers for the records carried by the frames the beacon
//! consumes (modem status, AT response, node identification).

use super::checksum::verify_api_checksum;
use super::protocol::*;
use crate::error::{BeaconError, Result};
use tracing::debug;

/// Decoder statistics for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed the checksum
    pub frames: u32,
    /// Frames dropped on a bad checksum
    pub checksum_errors: u32,
    /// Frames dropped for an impossible length
    pub length_errors: u32,
}

/// One complete, checksummed API frame borrowed from the decoder buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiFrame<'a> {
    pub frame_type: u8,
    /// Frame data after the type byte
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    LengthHigh,
    LengthLow(u8),
    Body,
    Checksum,
}

/// Incremental API frame decoder
pub struct ApiFrameDecoder {
    state: State,
    expected: usize,
    buffer: heapless::Vec<u8, XBEE_MAX_FRAME_LEN>,
    stats: DecoderStats,
}

impl Default for ApiFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiFrameDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            expected: 0,
            buffer: heapless::Vec::new(),
            stats: DecoderStats::default(),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Feed one byte; returns a frame when its checksum byte arrives and verifies
    pub fn push(&mut self, byte: u8) -> Option<ApiFrame<'_>> {
        match self.state {
            State::Start => {
                if byte == XBEE_START_DELIMITER {
                    self.buffer.clear();
                    self.state = State::LengthHigh;
                }
                None
            }
            State::LengthHigh => {
                self.state = State::LengthLow(byte);
                None
            }
            State::LengthLow(high) => {
                let length = u16::from_be_bytes([high, byte]) as usize;
                if length == 0 || length > XBEE_MAX_FRAME_LEN {
                    debug!("Dropping XBee frame with length {}", length);
                    self.stats.length_errors += 1;
                    self.state = State::Start;
                } else {
                    self.expected = length;
                    self.state = State::Body;
                }
                None
            }
            State::Body => {
                // expected <= capacity, so this never overflows
                let _ = self.buffer.push(byte);
                if self.buffer.len() == self.expected {
                    self.state = State::Checksum;
                }
                None
            }
            State::Checksum => {
                self.state = State::Start;
                if !verify_api_checksum(&self.buffer, byte) {
                    debug!("Dropping XBee frame with bad checksum 0x{:02X}", byte);
                    self.stats.checksum_errors += 1;
                    return None;
                }
                self.stats.frames += 1;
                Some(ApiFrame {
                    frame_type: self.buffer[0],
                    data: &self.buffer[1..],
                })
            }
        }
    }
}

/// Decode a modem status frame body
pub fn decode_modem_status(data: &[u8]) -> Result<ModemStatus> {
    let status = *data.first().ok_or_else(|| {
        BeaconError::XbeeProtocol("Modem status frame too short".to_string())
    })?;
    Ok(ModemStatus { status })
}

/// Decode a transmit status frame body
pub fn decode_transmit_status(data: &[u8]) -> Result<TransmitStatus> {
    if data.len() < TRANSMIT_STATUS_LEN {
        return Err(BeaconError::XbeeProtocol(format!(
            "Transmit status too short: {} bytes",
            data.len()
        )));
    }

    Ok(TransmitStatus {
        frame_id: data[0],
        destination_network_address: u16::from_be_bytes([data[1], data[2]]),
        retry_count: data[3],
        delivery_status: data[4],
        discovery_status: data[5],
    })
}

/// Decode a local AT command response frame body
///
/// The value is everything after the fixed four bytes (`length − 4`),
/// truncated to [`AT_RESPONSE_MAX_VALUE`].
pub fn decode_at_response(data: &[u8]) -> Result<AtResponse> {
    if data.len() < AT_RESPONSE_FIXED_LEN {
        return Err(BeaconError::XbeeProtocol(format!(
            "AT response too short: {} bytes",
            data.len()
        )));
    }

    let var_len = data.len() - AT_RESPONSE_FIXED_LEN;
    let mut value = heapless::Vec::new();
    for &byte in data[AT_RESPONSE_FIXED_LEN..].iter().take(AT_RESPONSE_MAX_VALUE) {
        let _ = value.push(byte);
    }
    if var_len > AT_RESPONSE_MAX_VALUE {
        debug!("AT response value truncated from {} bytes", var_len);
    }

    Ok(AtResponse {
        frame_id: data[0],
        command: [data[1], data[2]],
        status: data[3],
        value,
    })
}

/// RF payload of a receive packet frame body
pub fn receive_packet_payload(data: &[u8]) -> Result<&[u8]> {
    data.get(RECEIVE_PACKET_HEADER_LEN..).ok_or_else(|| {
        BeaconError::XbeeProtocol(format!("Receive packet too short: {} bytes", data.len()))
    })
}

/// Decode a node identification indicator frame body
pub fn decode_node_identification(data: &[u8]) -> Result<NodeIdentification> {
    // sender64(8) + sender16(2) + options(1) + remote16(2) + remote64(8)
    const FIXED_HEAD: usize = 21;
    // parent16(2) + device type(1) + source event(1) + profile(2) + manufacturer(2)
    const FIXED_TAIL: usize = 8;

    let too_short = || {
        BeaconError::XbeeProtocol(format!(
            "Node identification too short: {} bytes",
            data.len()
        ))
    };

    if data.len() < FIXED_HEAD + 1 + FIXED_TAIL {
        return Err(too_short());
    }

    let ni_len = data[FIXED_HEAD..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| BeaconError::XbeeProtocol("Unterminated node identifier".to_string()))?;

    let tail = FIXED_HEAD + ni_len + 1;
    if data.len() < tail + FIXED_TAIL {
        return Err(too_short());
    }

    let mut node_identifier = heapless::Vec::new();
    for &byte in data[FIXED_HEAD..FIXED_HEAD + ni_len]
        .iter()
        .take(NODE_IDENTIFIER_MAX_LEN)
    {
        let _ = node_identifier.push(byte);
    }

    Ok(NodeIdentification {
        sender_address: be_u64(&data[0..8]),
        sender_network_address: u16::from_be_bytes([data[8], data[9]]),
        options: data[10],
        remote_network_address: u16::from_be_bytes([data[11], data[12]]),
        remote_source_address: be_u64(&data[13..21]),
        node_identifier,
        parent_network_address: u16::from_be_bytes([data[tail], data[tail + 1]]),
        device_type: data[tail + 2],
        source_event: data[tail + 3],
        profile_id: u16::from_be_bytes([data[tail + 4], data[tail + 5]]),
        manufacturer_id: u16::from_be_bytes([data[tail + 6], data[tail + 7]]),
    })
}

fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
pub(crate) mod test_frames {
    //! Builders for inbound frame bodies used across the crate's tests

    use super::*;

    pub fn node_identification_body(
        remote_network_address: u16,
        remote_source_address: u64,
        source_event: u8,
    ) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&remote_source_address.to_be_bytes()); // sender64
        data.extend_from_slice(&remote_network_address.to_be_bytes()); // sender16
        data.push(0x02); // options: broadcast
        data.extend_from_slice(&remote_network_address.to_be_bytes());
        data.extend_from_slice(&remote_source_address.to_be_bytes());
        data.extend_from_slice(b"CRAFT\0");
        data.extend_from_slice(&[0xFF, 0xFE]); // parent
        data.push(0x01); // router
        data.push(source_event);
        data.extend_from_slice(&[0xC1, 0x05]);
        data.extend_from_slice(&[0x10, 0x1E]);
        data
    }

    pub fn receive_packet_body(source_address: u64, network_address: u16, payload: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&source_address.to_be_bytes());
        data.extend_from_slice(&network_address.to_be_bytes());
        data.push(0x01); // acknowledged
        data.extend_from_slice(payload);
        data
    }
}
