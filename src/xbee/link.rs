//! # Radio Link
//!
//! Turns decoded API frames into typed events and owns every send to the
//! radio. Each send takes the [`TransportGuard`] before the frame is built and
//! drops it right after the write, so a receive-side reentry can never
//! interleave with an outgoing frame.

use super::decoder::{
    decode_at_response, decode_modem_status, decode_node_identification, decode_transmit_status,
    receive_packet_payload,
};
use super::encoder::{encode_at_command, encode_transmit_request};
use super::protocol::*;
use crate::pending::Pending;
use crate::serial::{Transport, TransportGuard};
use crate::session::CraftSession;
use tracing::{debug, info, warn};

/// What a demultiplexed frame meant to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent<'f> {
    /// RF payload to feed byte-wise into the MAVLink decoder
    Data(&'f [u8]),
    /// A craft was bound from a node identification indicator
    Paired {
        /// The indicator reported an active join (the join window was closed)
        join_event: bool,
    },
    /// Record stored for the idle step, or nothing to do
    Handled,
    /// Malformed frame, dropped
    Dropped,
}

/// Link counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub frames: u32,
    pub data_frames: u32,
    pub dropped_frames: u32,
    pub pairings: u32,
    pub sent_frames: u32,
    pub send_errors: u32,
    /// Transmit status reports other than delivered
    pub delivery_failures: u32,
}

/// Single-peer radio link over an XBee module in API mode
pub struct RadioLink<T: Transport> {
    transport: T,
    modem_status: Pending<ModemStatus>,
    at_response: Pending<AtResponse>,
    transmit_allowed: bool,
    join_open: bool,
    next_frame_id: u8,
    stats: LinkStats,
}

impl<T: Transport> RadioLink<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            modem_status: Pending::new(),
            at_response: Pending::new(),
            transmit_allowed: false,
            join_open: false,
            next_frame_id: 1,
            stats: LinkStats::default(),
        }
    }

    /// Dispatch one received API frame
    ///
    /// # Arguments
    ///
    /// * `frame_type` - API frame type byte
    /// * `data` - Frame data after the type byte
    /// * `session` - The craft session, bound here on node identification
    ///
    /// # Returns
    ///
    /// * `RadioEvent` - Receive packets borrow their payload from `data`
    ///   instead of copying it
    pub fn demux<'f>(
        &mut self,
        frame_type: u8,
        data: &'f [u8],
        session: &mut CraftSession,
    ) -> RadioEvent<'f> {
        self.stats.frames += 1;

        match FrameType::from(frame_type) {
            FrameType::ModemStatus => match decode_modem_status(data) {
                Ok(status) => {
                    debug!("Modem status 0x{:02X}", status.status);
                    self.modem_status.publish(status);
                    RadioEvent::Handled
                }
                Err(e) => self.drop_frame(e),
            },
            FrameType::AtResponse => match decode_at_response(data) {
                Ok(response) => {
                    debug!(
                        "AT {} response, status {}",
                        String::from_utf8_lossy(&response.command),
                        response.status
                    );
                    self.at_response.publish(response);
                    RadioEvent::Handled
                }
                Err(e) => self.drop_frame(e),
            },
            FrameType::TransmitStatus => match decode_transmit_status(data) {
                Ok(status) => {
                    if !status.is_delivered() {
                        self.stats.delivery_failures += 1;
                        debug!(
                            "Transmit frame {} not delivered: status 0x{:02X} after {} retries",
                            status.frame_id, status.delivery_status, status.retry_count
                        );
                    }
                    RadioEvent::Handled
                }
                Err(e) => self.drop_frame(e),
            },
            FrameType::ReceivePacket => match receive_packet_payload(data) {
                Ok(payload) => {
                    self.stats.data_frames += 1;
                    RadioEvent::Data(payload)
                }
                Err(e) => self.drop_frame(e),
            },
            FrameType::NodeIdentification => match decode_node_identification(data) {
                Ok(ni) => self.on_node_identification(&ni, session),
                Err(e) => self.drop_frame(e),
            },
            FrameType::Other(other) => {
                debug!("Ignoring XBee frame type 0x{:02X}", other);
                RadioEvent::Handled
            }
        }
    }

    fn on_node_identification(
        &mut self,
        ni: &NodeIdentification,
        session: &mut CraftSession,
    ) -> RadioEvent<'static> {
        if session.valid {
            debug!(
                "Node 0x{:016X} identified while paired, ignoring",
                ni.remote_source_address
            );
            return RadioEvent::Handled;
        }

        let join_event = ni.is_join_event();
        if join_event {
            self.stop_join();
        }

        session.bind_radio(ni.remote_network_address, ni.remote_source_address);
        self.stats.pairings += 1;
        info!(
            "Paired with craft radio 0x{:016X} (net 0x{:04X}){}",
            ni.remote_source_address,
            ni.remote_network_address,
            if join_event { " by join" } else { "" }
        );

        RadioEvent::Paired { join_event }
    }

    fn drop_frame(&mut self, error: crate::error::BeaconError) -> RadioEvent<'static> {
        debug!("Dropping radio frame: {}", error);
        self.stats.dropped_frames += 1;
        RadioEvent::Dropped
    }

    /// Consume a pending modem status, updating whether transmission is allowed
    pub fn service_modem_status(&mut self) -> Option<ModemStatus> {
        let status = self.modem_status.take()?;
        if status.is_joined() {
            if !self.transmit_allowed {
                info!("Radio joined network, transmit allowed");
            }
            self.transmit_allowed = true;
        } else if status.is_disassociated() {
            if self.transmit_allowed {
                warn!("Radio disassociated, transmit disallowed");
            }
            self.transmit_allowed = false;
        }
        Some(status)
    }

    /// Consume the latest AT command response
    pub fn take_at_response(&mut self) -> Option<AtResponse> {
        self.at_response.take()
    }

    pub fn transmit_allowed(&self) -> bool {
        self.transmit_allowed
    }

    pub fn join_open(&self) -> bool {
        self.join_open
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Send `payload` to an explicit radio address
    pub fn write_unicast(&mut self, address: u64, network_address: u16, payload: &[u8]) {
        let mut guard = TransportGuard::acquire(&mut self.transport);
        let frame = encode_transmit_request(0x00, address, network_address, payload);
        Self::write_frame(&mut *guard, &mut self.stats, &frame);
    }

    /// Send `payload` to every node on the network
    pub fn write_broadcast(&mut self, payload: &[u8]) {
        self.write_unicast(XBEE_BROADCAST_ADDRESS, XBEE_UNKNOWN_NETWORK_ADDRESS, payload);
    }

    /// Send `payload` to the network coordinator
    pub fn write_to_coordinator(&mut self, payload: &[u8]) {
        self.write_unicast(XBEE_COORDINATOR_ADDRESS, XBEE_UNKNOWN_NETWORK_ADDRESS, payload);
    }

    /// Send `payload` to the bound craft, or broadcast when none is bound
    pub fn write_to_craft(&mut self, session: &CraftSession, payload: &[u8]) {
        if session.valid {
            self.write_unicast(session.source_address, session.network_address, payload);
        } else {
            self.write_broadcast(payload);
        }
    }

    /// Issue a local AT command
    pub fn send_at(&mut self, command: [u8; 2], parameter: &[u8]) {
        let frame_id = self.next_frame_id;
        // frame id 0 would suppress the response
        self.next_frame_id = self.next_frame_id.checked_add(1).unwrap_or(1);

        let mut guard = TransportGuard::acquire(&mut self.transport);
        let frame = encode_at_command(frame_id, command, parameter);
        Self::write_frame(&mut *guard, &mut self.stats, &frame);
    }

    /// Let new nodes join for `period_s` seconds
    pub fn open_join_window(&mut self, period_s: u8) {
        info!("Opening join window for {} s", period_s);
        self.send_at(*b"NJ", &[period_s]);
        self.send_at(*b"AC", &[]);
        self.join_open = true;
    }

    /// Stop accepting joins
    pub fn stop_join(&mut self) {
        debug!("Closing join window");
        self.send_at(*b"NJ", &[0]);
        self.send_at(*b"AC", &[]);
        self.join_open = false;
    }

    /// Restore module defaults and persist them
    pub fn factory_reset(&mut self) {
        warn!("Factory resetting radio module");
        self.send_at(*b"RE", &[]);
        self.send_at(*b"WR", &[]);
        self.send_at(*b"AC", &[]);
        self.join_open = false;
    }

    /// Mask radio receive for a bus transaction that does not go through the link
    pub fn inhibit(&mut self) -> TransportGuard<'_, T> {
        TransportGuard::acquire(&mut self.transport)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn write_frame(transport: &mut T, stats: &mut LinkStats, frame: &[u8]) {
        match transport.write(frame) {
            Ok(()) => stats.sent_frames += 1,
            Err(e) => {
                warn!("Radio write failed: {}", e);
                stats.send_errors += 1;
            }
        }
    }
}
