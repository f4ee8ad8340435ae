//! # Craft Session
//!
//! The single paired craft: its radio addresses, its MAVLink system id and a
//! mirror of the state it reports. Exactly zero or one session is valid at a
//! time, and once the sysid is bound it does not change until the session is
//! invalidated by an operator action.

use crate::pending::Pending;

/// Maximum status text length carried by STATUSTEXT
pub const STATUS_TEXT_LEN: usize = 50;

/// Craft position as reported by the craft's own GPS (GPS_RAW_INT units)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CraftPosition {
    /// Latitude, degrees × 10^7
    pub lat: i32,
    /// Longitude, degrees × 10^7
    pub lon: i32,
    /// Altitude MSL, millimetres
    pub alt: i32,
    /// GPS fix type
    pub fix: u8,
}

/// Bounded status text from the craft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusText {
    pub severity: u8,
    text: heapless::Vec<u8, STATUS_TEXT_LEN>,
}

impl StatusText {
    /// Copy at most [`STATUS_TEXT_LEN`] bytes of `raw`, stopping at the first NUL
    pub fn from_raw(severity: u8, raw: &[u8]) -> Self {
        let mut text = heapless::Vec::new();
        for &byte in raw.iter().take(STATUS_TEXT_LEN) {
            if byte == 0 {
                break;
            }
            // capacity equals the take() bound
            let _ = text.push(byte);
        }
        Self { severity, text }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.text
    }

    /// Lossy UTF-8 view for logging
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.text).into_owned()
    }
}

/// The paired craft record
#[derive(Debug, Clone, Default)]
pub struct CraftSession {
    /// Radio addresses are bound
    pub valid: bool,
    /// MAVLink sysid is bound
    pub id_valid: bool,
    /// 16-bit network address of the craft radio
    pub network_address: u16,
    /// 64-bit source address of the craft radio
    pub source_address: u64,
    /// Bound MAVLink system id
    pub sysid: u8,
    /// A heartbeat has been seen and the link is not lost
    pub connected: bool,
    pub base_mode: u8,
    pub system_status: u8,
    /// Battery voltage in millivolts
    pub battery_mv: u16,
    pub position: CraftPosition,
    /// Unread status text for an external consumer
    pub status_text: Pending<StatusText>,
}

impl CraftSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the radio addresses of a newly identified node
    pub fn bind_radio(&mut self, network_address: u16, source_address: u64) {
        self.valid = true;
        self.network_address = network_address;
        self.source_address = source_address;
    }

    /// Bind `sysid` if no sysid is bound yet. Returns true if it was bound now.
    pub fn bind_sysid(&mut self, sysid: u8) -> bool {
        if self.id_valid {
            return false;
        }
        self.sysid = sysid;
        self.id_valid = true;
        true
    }

    /// Whether a message from `sysid` may touch craft state
    pub fn accepts(&self, sysid: u8) -> bool {
        self.id_valid && self.sysid == sysid
    }

    /// Forget the paired craft entirely
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unbound() {
        let session = CraftSession::new();
        assert!(!session.valid);
        assert!(!session.id_valid);
        assert!(!session.accepts(0));
    }

    #[test]
    fn test_sysid_binds_once() {
        let mut session = CraftSession::new();
        assert!(session.bind_sysid(7));
        assert!(!session.bind_sysid(9));
        assert_eq!(session.sysid, 7);
        assert!(session.accepts(7));
        assert!(!session.accepts(9));
    }

    #[test]
    fn test_bind_radio() {
        let mut session = CraftSession::new();
        session.bind_radio(0x1234, 0x0013_A200_4000_0001);
        assert!(session.valid);
        assert_eq!(session.network_address, 0x1234);
        assert_eq!(session.source_address, 0x0013_A200_4000_0001);
    }

    #[test]
    fn test_invalidate_clears_everything() {
        let mut session = CraftSession::new();
        session.bind_radio(1, 2);
        session.bind_sysid(3);
        session.connected = true;
        session.status_text.publish(StatusText::from_raw(6, b"hi"));

        session.invalidate();

        assert!(!session.valid);
        assert!(!session.id_valid);
        assert!(!session.connected);
        assert!(!session.status_text.is_pending());
        assert!(session.bind_sysid(4));
    }

    #[test]
    fn test_status_text_stops_at_nul() {
        let text = StatusText::from_raw(4, b"ARMED\0garbage");
        assert_eq!(text.as_bytes(), b"ARMED");
        assert_eq!(text.severity, 4);
    }

    #[test]
    fn test_status_text_truncates_at_bound() {
        let raw = [b'x'; 80];
        let text = StatusText::from_raw(6, &raw);
        assert_eq!(text.as_bytes().len(), STATUS_TEXT_LEN);
    }

    #[test]
    fn test_status_text_lossy() {
        let text = StatusText::from_raw(6, b"Low battery");
        assert_eq!(text.to_string_lossy(), "Low battery");
    }
}
