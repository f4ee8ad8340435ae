//! # Protocol Bridge
//!
//! MAVLink side of the beacon: decodes the craft's byte stream, enforces the
//! single-peer identity lock, applies each message to the craft session, and
//! encodes everything the beacon sends.
//!
//! Outbound frames are MAVLink v1 with the beacon's own system and component
//! ids and a running sequence number.

pub mod framer;

pub use framer::{FramerStats, MavFramer};

use crate::params::{OutboundParam, ParamName, ParamSource, ParameterStore};
use crate::scheduler::LinkHealth;
use crate::serial::Transport;
use crate::session::{CraftPosition, CraftSession, StatusText};
use crate::xbee::RadioLink;
use mavlink::common::*;
use mavlink::MavHeader;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Bridge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub decoded: u32,
    /// Messages dropped because their sysid is not the bound craft's
    pub foreign_dropped: u32,
    pub sent: u32,
    pub encode_errors: u32,
}

/// Durable storage operation requested over MAVLink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageRequest {
    Load,
    Save,
}

/// Beacon state a decoded message may touch
pub struct DispatchContext<'a, T: Transport> {
    pub radio: &'a mut RadioLink<T>,
    pub session: &'a mut CraftSession,
    pub health: &'a mut LinkHealth,
    pub params: &'a mut ParameterStore,
    /// Current time base, echoed in ping replies
    pub sys_us: u64,
}

/// MAVLink codec and dispatcher
pub struct ProtocolBridge {
    framer: MavFramer,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    stats: BridgeStats,
}

impl ProtocolBridge {
    pub fn new(system_id: u8, component_id: u8) -> Self {
        Self {
            framer: MavFramer::new(),
            system_id,
            component_id,
            sequence: 0,
            stats: BridgeStats::default(),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    pub fn framer_stats(&self) -> FramerStats {
        self.framer.stats()
    }

    /// Feed one byte of craft payload
    ///
    /// One byte can complete several frames; drain the rest with
    /// [`ProtocolBridge::next_message`] until it returns `None`.
    pub fn feed_byte(&mut self, byte: u8) -> Option<(MavHeader, MavMessage)> {
        let decoded = self.framer.push(byte);
        self.count(decoded)
    }

    /// Next message already complete in the framer
    pub fn next_message(&mut self) -> Option<(MavHeader, MavMessage)> {
        let decoded = self.framer.next_frame();
        self.count(decoded)
    }

    fn count(
        &mut self,
        decoded: Option<(MavHeader, MavMessage)>,
    ) -> Option<(MavHeader, MavMessage)> {
        if decoded.is_some() {
            self.stats.decoded += 1;
        }
        decoded
    }

    /// Apply a decoded message, subject to the identity lock
    ///
    /// The first message binds its sender's sysid to the session; messages
    /// from any other sysid are dropped without effect.
    ///
    /// # Returns
    ///
    /// * `Option<StorageRequest>` - A parameter load or save the caller should run
    pub fn dispatch<T: Transport>(
        &mut self,
        header: &MavHeader,
        msg: &MavMessage,
        ctx: &mut DispatchContext<'_, T>,
    ) -> Option<StorageRequest> {
        if ctx.session.bind_sysid(header.system_id) {
            info!("Bound craft sysid {}", header.system_id);
        }
        if !ctx.session.accepts(header.system_id) {
            debug!(
                "Dropping message from sysid {} (bound to {})",
                header.system_id, ctx.session.sysid
            );
            self.stats.foreign_dropped += 1;
            return None;
        }

        match msg {
            MavMessage::HEARTBEAT(data) => {
                if !ctx.session.connected {
                    info!("Craft {} connected", header.system_id);
                }
                ctx.session.connected = true;
                ctx.health.heartbeat();
                let base_mode = data.base_mode.bits();
                let system_status = data.system_status as u8;
                if base_mode != ctx.session.base_mode || system_status != ctx.session.system_status {
                    debug!("Craft mode 0x{:02X}, status {}", base_mode, system_status);
                }
                ctx.session.base_mode = base_mode;
                ctx.session.system_status = system_status;
            }
            MavMessage::SYS_STATUS(data) => {
                ctx.session.battery_mv = data.voltage_battery;
            }
            MavMessage::PING(data) => {
                if data.target_system == 0 {
                    self.reply_ping(header, data, ctx.radio, ctx.sys_us);
                }
            }
            MavMessage::GPS_RAW_INT(data) => {
                ctx.session.position = CraftPosition {
                    lat: data.lat,
                    lon: data.lon,
                    alt: data.alt,
                    fix: data.fix_type as u8,
                };
            }
            MavMessage::STATUSTEXT(data) => {
                let text = StatusText::from_raw(data.severity as u8, &data.text);
                info!("Craft status [{}]: {}", text.severity, text.to_string_lossy());
                ctx.session.status_text.publish(text);
            }
            MavMessage::PARAM_REQUEST_LIST(data) => {
                if self.targets_us(data.target_system) {
                    ctx.params.start_sweep();
                }
            }
            MavMessage::PARAM_REQUEST_READ(data) => {
                if self.targets_us(data.target_system) {
                    Self::request_read(data, ctx.params);
                }
            }
            MavMessage::PARAM_SET(data) => {
                if self.targets_us(data.target_system) {
                    Self::set_param(data, ctx.params);
                }
            }
            MavMessage::COMMAND_LONG(data) => {
                if self.targets_us(data.target_system)
                    && data.command == MavCmd::MAV_CMD_PREFLIGHT_STORAGE
                {
                    return match data.param1 as i32 {
                        0 => Some(StorageRequest::Load),
                        1 => Some(StorageRequest::Save),
                        other => {
                            debug!("Ignoring preflight storage action {}", other);
                            None
                        }
                    };
                }
            }
            _ => {}
        }
        None
    }

    fn targets_us(&self, target_system: u8) -> bool {
        target_system == 0 || target_system == self.system_id
    }

    fn request_read(data: &PARAM_REQUEST_READ_DATA, params: &mut ParameterStore) {
        let index = if data.param_index >= 0 {
            Some(data.param_index as usize)
        } else {
            params.find(&ParamName::from_bytes(&data.param_id))
        };

        match index {
            Some(index) => {
                params.request_single(index);
            }
            None => debug!(
                "Unknown parameter {} requested",
                ParamName::from_bytes(&data.param_id)
            ),
        }
    }

    fn set_param(data: &PARAM_SET_DATA, params: &mut ParameterStore) {
        let name = ParamName::from_bytes(&data.param_id);
        if data.param_type != MavParamType::MAV_PARAM_TYPE_REAL32 {
            debug!("Ignoring non-float set of {}", name);
            return;
        }

        let Some(index) = params.set_by_name(&name, data.param_value) else {
            debug!("Ignoring set of unknown parameter {}", name);
            return;
        };
        info!("Parameter {} set to {}", name, data.param_value);
        if let Some(echo) = params.outbound(index, ParamSource::Queued) {
            params.enqueue(echo);
        }
    }

    fn reply_ping<T: Transport>(
        &mut self,
        header: &MavHeader,
        data: &PING_DATA,
        radio: &mut RadioLink<T>,
        sys_us: u64,
    ) {
        let reply = MavMessage::PING(PING_DATA {
            time_usec: sys_us,
            seq: data.seq,
            target_system: header.system_id,
            target_component: header.component_id,
        });
        if let Some(frame) = self.encode(&reply) {
            radio.write_broadcast(&frame);
        }
    }

    /// Send the beacon's heartbeat to the bound craft, or broadcast it
    pub fn send_heartbeat<T: Transport>(&mut self, radio: &mut RadioLink<T>, session: &CraftSession) {
        let heartbeat = MavMessage::HEARTBEAT(HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_GCS,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::MAV_MODE_FLAG_MANUAL_INPUT_ENABLED,
            system_status: MavState::MAV_STATE_STANDBY,
            mavlink_version: 3,
        });
        if let Some(frame) = self.encode(&heartbeat) {
            radio.write_to_craft(session, &frame);
        }
    }

    /// Send one `PARAM_VALUE` to the coordinator
    pub fn send_param_value<T: Transport>(&mut self, radio: &mut RadioLink<T>, param: &OutboundParam) {
        let value = MavMessage::PARAM_VALUE(PARAM_VALUE_DATA {
            param_value: param.value,
            param_count: param.count,
            param_index: param.index,
            param_id: param.name.to_array(),
            param_type: MavParamType::MAV_PARAM_TYPE_REAL32,
        });
        if let Some(frame) = self.encode(&value) {
            radio.write_to_coordinator(&frame);
        }
    }

    fn encode(&mut self, msg: &MavMessage) -> Option<Vec<u8>> {
        let header = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        let mut buf = Cursor::new(Vec::with_capacity(64));
        match mavlink::write_v1_msg(&mut buf, header, msg) {
            Ok(_) => {
                self.stats.sent += 1;
                Some(buf.into_inner())
            }
            Err(e) => {
                warn!("Failed to encode MAVLink message: {:?}", e);
                self.stats.encode_errors += 1;
                None
            }
        }
    }
}
