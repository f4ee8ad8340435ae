//! # MAVLink Framer
//!
//! Byte-at-a-time MAVLink v1/v2 frame assembly. The radio delivers payload
//! in fragments of arbitrary size, so bytes are accumulated until a whole
//! frame is present; the frame is then handed to `mavlink` for CRC check and
//! message decoding.
//!
//! Frame sizes:
//!
//! ```text
//! v1: 0xFE | len | seq | sys | comp | msgid      | payload | crc(2)  = 8 + len
//! v2: 0xFD | len | incompat | compat | seq | sys | comp | msgid(3)
//!                                              | payload | crc(2)  = 12 + len
//!     (+13 when incompat bit 0 marks a signed frame)
//! ```
//!
//! A candidate frame is only handed to `mavlink` once its CRC (X.25 over
//! everything after the start byte, plus the message's CRC_EXTRA) checks out
//! at the candidate's own start. Anything else is a stray start byte: it is
//! dropped and the buffer is rescanned from the next start byte, so a valid
//! frame behind noise is never swallowed by a bogus length field.

use mavlink::common::MavMessage;
use mavlink::peek_reader::PeekReader;
use mavlink::{MavHeader, Message};
use std::io::Cursor;
use tracing::trace;

/// MAVLink v1 start byte
pub const MAVLINK_V1_STX: u8 = 0xFE;

/// MAVLink v2 start byte
pub const MAVLINK_V2_STX: u8 = 0xFD;

/// Largest possible frame (signed v2 with a full payload)
pub const MAVLINK_MAX_FRAME_LEN: usize = V2_HEADER_LEN + 255 + 2 + MAVLINK_SIGNATURE_LEN;

/// Start byte through message id
const V1_HEADER_LEN: usize = 6;
const V2_HEADER_LEN: usize = 10;

const MAVLINK_IFLAG_SIGNED: u8 = 0x01;
const MAVLINK_SIGNATURE_LEN: usize = 13;

const X25_INIT: u16 = 0xFFFF;

/// Framer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    pub frames: u32,
    /// Frames rejected by CRC or with an unknown message id
    pub parse_errors: u32,
}

/// Incremental MAVLink frame assembler
pub struct MavFramer {
    buffer: heapless::Vec<u8, MAVLINK_MAX_FRAME_LEN>,
    stats: FramerStats,
}

impl Default for MavFramer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_stx(byte: u8) -> bool {
    byte == MAVLINK_V1_STX || byte == MAVLINK_V2_STX
}

impl MavFramer {
    pub fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
            stats: FramerStats::default(),
        }
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Feed one byte; returns a message once a frame completes and decodes
    ///
    /// A byte can complete more than one frame when it finishes a bogus
    /// candidate that had valid frames queued behind it. The first is
    /// returned here; drain the rest with [`MavFramer::next_frame`].
    pub fn push(&mut self, byte: u8) -> Option<(MavHeader, MavMessage)> {
        if self.buffer.is_empty() && !is_stx(byte) {
            return None;
        }
        if self.buffer.push(byte).is_err() {
            // unreachable while frame_len() bounds the buffer
            self.buffer.clear();
            return None;
        }
        self.next_frame()
    }

    /// Next complete frame already held in the buffer, if any
    pub fn next_frame(&mut self) -> Option<(MavHeader, MavMessage)> {
        loop {
            let frame_len = self.frame_len()?;
            if self.buffer.len() < frame_len {
                return None;
            }

            match self.decode(frame_len) {
                Some(decoded) => {
                    self.stats.frames += 1;
                    self.consume(frame_len);
                    return Some(decoded);
                }
                None => {
                    self.stats.parse_errors += 1;
                    // the start byte may have been noise; rescan after it
                    self.consume(1);
                }
            }
        }
    }

    /// Total length of the frame being assembled, once the header says
    fn frame_len(&self) -> Option<usize> {
        let payload_len = *self.buffer.get(1)? as usize;
        if self.buffer[0] == MAVLINK_V2_STX {
            let incompat = *self.buffer.get(2)?;
            let base = V2_HEADER_LEN + payload_len + 2;
            Some(if incompat & MAVLINK_IFLAG_SIGNED != 0 {
                base + MAVLINK_SIGNATURE_LEN
            } else {
                base
            })
        } else {
            Some(V1_HEADER_LEN + payload_len + 2)
        }
    }

    /// Decode the candidate at offset 0, or nothing
    fn decode(&self, frame_len: usize) -> Option<(MavHeader, MavMessage)> {
        let frame = &self.buffer[..frame_len];
        let v2 = frame[0] == MAVLINK_V2_STX;

        if v2 && frame[2] & !MAVLINK_IFLAG_SIGNED != 0 {
            trace!("MAVLink v2 frame with unknown incompat flags 0x{:02X}", frame[2]);
            return None;
        }
        if !crc_matches(frame, v2) {
            trace!("MAVLink frame CRC mismatch at candidate start");
            return None;
        }

        let mut reader = PeekReader::new(Cursor::new(frame));
        let result = if v2 {
            mavlink::read_v2_msg::<MavMessage, _>(&mut reader)
        } else {
            mavlink::read_v1_msg::<MavMessage, _>(&mut reader)
        };

        match result {
            Ok((header, msg)) => {
                let system_id = if v2 { frame[5] } else { frame[3] };
                (header.system_id == system_id).then_some((header, msg))
            }
            Err(e) => {
                trace!("MAVLink frame rejected: {:?}", e);
                None
            }
        }
    }

    /// Drop `len` leading bytes and anything before the next start byte
    fn consume(&mut self, len: usize) {
        let rest = &self.buffer[len..];
        let start = rest.iter().position(|&b| is_stx(b)).unwrap_or(rest.len());
        let keep: heapless::Vec<u8, MAVLINK_MAX_FRAME_LEN> =
            rest[start..].iter().copied().collect();
        self.buffer = keep;
    }
}

/// Check the X.25 CRC of a complete candidate frame
fn crc_matches(frame: &[u8], v2: bool) -> bool {
    let (header_len, message_id) = if v2 {
        (
            V2_HEADER_LEN,
            u32::from_le_bytes([frame[7], frame[8], frame[9], 0]),
        )
    } else {
        (V1_HEADER_LEN, u32::from(frame[5]))
    };
    let crc_at = header_len + frame[1] as usize;

    let mut crc = X25_INIT;
    for &byte in &frame[1..crc_at] {
        crc = x25_accumulate(crc, byte);
    }
    crc = x25_accumulate(crc, MavMessage::extra_crc(message_id));

    crc == u16::from_le_bytes([frame[crc_at], frame[crc_at + 1]])
}

fn x25_accumulate(crc: u16, byte: u8) -> u16 {
    let mut tmp = byte ^ (crc & 0xFF) as u8;
    tmp ^= tmp << 4;
    let tmp = u16::from(tmp);
    (crc >> 8) ^ (tmp << 8) ^ (tmp << 3) ^ (tmp >> 4)
}

#[cfg(test)]
pub(crate) mod test_frames {
    //! MAVLink frames as a craft would send them

    use mavlink::common::*;
    use mavlink::MavHeader;
    use std::io::Cursor;

    pub fn header(system_id: u8) -> MavHeader {
        MavHeader {
            system_id,
            component_id: 1,
            sequence: 0,
        }
    }

    pub fn encode_v1(system_id: u8, msg: &MavMessage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        mavlink::write_v1_msg(&mut buf, header(system_id), msg).unwrap();
        buf.into_inner()
    }

    pub fn encode_v2(system_id: u8, msg: &MavMessage) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        mavlink::write_v2_msg(&mut buf, header(system_id), msg).unwrap();
        buf.into_inner()
    }

    pub fn heartbeat() -> MavMessage {
        MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_QUADROTOR,
            autopilot: MavAutopilot::MAV_AUTOPILOT_GENERIC,
            base_mode: MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED
                | MavModeFlag::MAV_MODE_FLAG_STABILIZE_ENABLED,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        })
    }

    pub fn ping(target_system: u8, seq: u32) -> MavMessage {
        MavMessage::PING(PING_DATA {
            time_usec: 1234,
            seq,
            target_system,
            target_component: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_frames::*;
    use super::*;
    use mavlink::Message;

    fn feed(framer: &mut MavFramer, bytes: &[u8]) -> Vec<(MavHeader, MavMessage)> {
        let mut out = Vec::new();
        for &byte in bytes {
            let mut decoded = framer.push(byte);
            while let Some(frame) = decoded {
                out.push(frame);
                decoded = framer.next_frame();
            }
        }
        out
    }

    fn heartbeats(count: usize) -> Vec<u8> {
        (0..count).flat_map(|_| encode_v1(7, &heartbeat())).collect()
    }

    #[test]
    fn test_v1_heartbeat() {
        let mut framer = MavFramer::new();
        let decoded = feed(&mut framer, &encode_v1(7, &heartbeat()));

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0.system_id, 7);
        assert_eq!(decoded[0].1.message_id(), 0);
        assert_eq!(framer.stats().frames, 1);
    }

    #[test]
    fn test_v2_ping() {
        let mut framer = MavFramer::new();
        let decoded = feed(&mut framer, &encode_v2(9, &ping(0, 5)));

        assert_eq!(decoded.len(), 1);
        match &decoded[0].1 {
            MavMessage::PING(data) => assert_eq!(data.seq, 5),
            other => panic!("expected PING, got {:?}", other),
        }
    }

    #[test]
    fn test_leading_noise_skipped() {
        let mut bytes = vec![0x00, 0x42, 0x13];
        bytes.extend(encode_v1(7, &heartbeat()));
        let mut framer = MavFramer::new();

        assert_eq!(feed(&mut framer, &bytes).len(), 1);
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut bytes = encode_v1(7, &heartbeat());
        bytes.extend(encode_v2(7, &ping(0, 1)));
        bytes.extend(encode_v1(7, &ping(0, 2)));
        let mut framer = MavFramer::new();

        assert_eq!(feed(&mut framer, &bytes).len(), 3);
    }

    #[test]
    fn test_bad_crc_dropped_then_recovers() {
        // pick a frame whose tail holds no start byte, so recovery is immediate
        let bad = (0u32..)
            .map(|custom_mode| {
                let msg = match heartbeat() {
                    MavMessage::HEARTBEAT(data) => {
                        MavMessage::HEARTBEAT(mavlink::common::HEARTBEAT_DATA { custom_mode, ..data })
                    }
                    other => other,
                };
                let mut frame = encode_v1(7, &msg);
                let last = frame.len() - 1;
                frame[last] ^= 0xFF;
                frame
            })
            .find(|frame| !frame[1..].iter().any(|&b| is_stx(b)))
            .unwrap();
        let mut framer = MavFramer::new();

        assert!(feed(&mut framer, &bad).is_empty());
        assert_eq!(framer.stats().parse_errors, 1);

        assert_eq!(feed(&mut framer, &encode_v1(7, &heartbeat())).len(), 1);
    }

    #[test]
    fn test_stray_start_spanning_two_frames() {
        // the bogus length covers both heartbeats exactly
        let mut bytes = vec![MAVLINK_V1_STX, 28];
        bytes.extend(heartbeats(2));
        let mut framer = MavFramer::new();

        assert_eq!(feed(&mut framer, &bytes).len(), 2);
        assert_eq!(framer.stats().parse_errors, 1);
        assert_eq!(framer.stats().frames, 2);
    }

    #[test]
    fn test_stray_start_ending_inside_second_frame() {
        let mut bytes = vec![MAVLINK_V1_STX, 20];
        bytes.extend(heartbeats(2));
        let mut framer = MavFramer::new();

        assert_eq!(feed(&mut framer, &bytes).len(), 2);
        assert_eq!(framer.stats().parse_errors, 1);
    }

    #[test]
    fn test_frame_behind_stray_start_needs_no_further_byte() {
        // the bogus candidate completes on the heartbeat's last byte
        let mut bytes = vec![MAVLINK_V1_STX, 11];
        bytes.extend(heartbeats(1));
        let mut framer = MavFramer::new();

        let decoded = feed(&mut framer, &bytes);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0.system_id, 7);
        assert!(framer.next_frame().is_none());
        assert_eq!(framer.stats().parse_errors, 1);
    }

    #[test]
    fn test_heartbeats_survive_random_leading_noise() {
        const FRAMES: usize = 20;
        let mut seed: u32 = 0x1234_5678;
        let mut next = move || {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (seed >> 24) as u8
        };

        for round in 0..32 {
            let noise_len = 1 + usize::from(next() % 24);
            let mut bytes: Vec<u8> = (0..noise_len)
                .map(|_| match next() % 4 {
                    0 => MAVLINK_V1_STX,
                    1 => MAVLINK_V2_STX,
                    _ => next(),
                })
                .collect();
            bytes.extend(heartbeats(FRAMES));
            let mut framer = MavFramer::new();

            let decoded = feed(&mut framer, &bytes);
            assert_eq!(decoded.len(), FRAMES, "round {} noise {:02X?}", round, &bytes[..noise_len]);
            assert!(decoded.iter().all(|(header, _)| header.system_id == 7));
        }
    }

    #[test]
    fn test_split_delivery() {
        let bytes = encode_v2(7, &heartbeat());
        let mut framer = MavFramer::new();
        let (head, tail) = bytes.split_at(5);

        assert!(feed(&mut framer, head).is_empty());
        assert_eq!(feed(&mut framer, tail).len(), 1);
    }
}
