//! # XBee API Protocol Constants and Types
//!
//! Frame layout (API mode 1, no escaping):
//!
//! ```text
//! 0x7E | length (u16 BE) | frame type | frame data ... | checksum
//! ```
//!
//! Throughout this crate a frame's `data` excludes the frame type byte, so
//! a receive packet's RF payload starts at [`RECEIVE_PACKET_HEADER_LEN`].

/// API frame start delimiter
pub const XBEE_START_DELIMITER: u8 = 0x7E;

/// Largest frame (type + data) accepted by the decoder
pub const XBEE_MAX_FRAME_LEN: usize = 512;

/// Local AT command request
pub const XBEE_FRAMETYPE_AT_COMMAND: u8 = 0x08;

/// Transmit request
pub const XBEE_FRAMETYPE_TRANSMIT_REQUEST: u8 = 0x10;

/// Local AT command response
pub const XBEE_FRAMETYPE_AT_RESPONSE: u8 = 0x88;

/// Modem status
pub const XBEE_FRAMETYPE_MODEM_STATUS: u8 = 0x8A;

/// Transmit status
pub const XBEE_FRAMETYPE_TRANSMIT_STATUS: u8 = 0x8B;

/// Receive packet
pub const XBEE_FRAMETYPE_RECEIVE_PACKET: u8 = 0x90;

/// Node identification indicator
pub const XBEE_FRAMETYPE_NODE_IDENTIFICATION: u8 = 0x95;

/// Receive packet header: source64(8) + source16(2) + options(1)
pub const RECEIVE_PACKET_HEADER_LEN: usize = 11;

/// 64-bit broadcast address
pub const XBEE_BROADCAST_ADDRESS: u64 = 0x0000_0000_0000_FFFF;

/// 64-bit coordinator address
pub const XBEE_COORDINATOR_ADDRESS: u64 = 0x0000_0000_0000_0000;

/// 16-bit address meaning "unknown, resolve by 64-bit address"
pub const XBEE_UNKNOWN_NETWORK_ADDRESS: u16 = 0xFFFE;

/// Modem status: joined network
pub const MODEM_STATUS_JOINED: u8 = 0x02;

/// Modem status: disassociated
pub const MODEM_STATUS_DISASSOCIATED: u8 = 0x03;

/// Node identification source event: a node joined
pub const SOURCE_EVENT_JOIN: u8 = 0x02;

/// Longest AT response value kept
pub const AT_RESPONSE_MAX_VALUE: usize = 32;

/// Longest node identifier string kept
pub const NODE_IDENTIFIER_MAX_LEN: usize = 20;

/// AT response length beyond the value: frame id + command(2) + status
pub const AT_RESPONSE_FIXED_LEN: usize = 4;

/// Transmit status body: frame id + dest16(2) + retries + delivery + discovery
pub const TRANSMIT_STATUS_LEN: usize = 6;

/// Transmit status: delivered
pub const DELIVERY_STATUS_SUCCESS: u8 = 0x00;

/// Frame types this beacon handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    ModemStatus,
    AtResponse,
    TransmitStatus,
    ReceivePacket,
    NodeIdentification,
    Other(u8),
}

impl From<u8> for FrameType {
    fn from(value: u8) -> Self {
        match value {
            XBEE_FRAMETYPE_MODEM_STATUS => FrameType::ModemStatus,
            XBEE_FRAMETYPE_AT_RESPONSE => FrameType::AtResponse,
            XBEE_FRAMETYPE_TRANSMIT_STATUS => FrameType::TransmitStatus,
            XBEE_FRAMETYPE_RECEIVE_PACKET => FrameType::ReceivePacket,
            XBEE_FRAMETYPE_NODE_IDENTIFICATION => FrameType::NodeIdentification,
            other => FrameType::Other(other),
        }
    }
}

/// Modem status record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemStatus {
    pub status: u8,
}

impl ModemStatus {
    pub fn is_joined(&self) -> bool {
        self.status == MODEM_STATUS_JOINED
    }

    pub fn is_disassociated(&self) -> bool {
        self.status == MODEM_STATUS_DISASSOCIATED
    }
}

/// Local AT command response record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtResponse {
    pub frame_id: u8,
    pub command: [u8; 2],
    pub status: u8,
    /// Variable-length value (`length − 4` bytes, bounded)
    pub value: heapless::Vec<u8, AT_RESPONSE_MAX_VALUE>,
}

impl AtResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Delivery report for a transmit request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitStatus {
    pub frame_id: u8,
    pub destination_network_address: u16,
    pub retry_count: u8,
    pub delivery_status: u8,
    pub discovery_status: u8,
}

impl TransmitStatus {
    pub fn is_delivered(&self) -> bool {
        self.delivery_status == DELIVERY_STATUS_SUCCESS
    }
}

/// Node identification indicator record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentification {
    /// 64-bit address of the radio that relayed the indicator
    pub sender_address: u64,
    /// 16-bit address of the radio that relayed the indicator
    pub sender_network_address: u16,
    pub options: u8,
    /// 16-bit network address of the identified node
    pub remote_network_address: u16,
    /// 64-bit source address of the identified node
    pub remote_source_address: u64,
    pub node_identifier: heapless::Vec<u8, NODE_IDENTIFIER_MAX_LEN>,
    pub parent_network_address: u16,
    pub device_type: u8,
    /// 1 = button, 2 = join event, 3 = power cycle
    pub source_event: u8,
    pub profile_id: u16,
    pub manufacturer_id: u16,
}

impl NodeIdentification {
    /// Whether this indicator reports a node actively joining
    pub fn is_join_event(&self) -> bool {
        self.source_event == SOURCE_EVENT_JOIN
    }
}
