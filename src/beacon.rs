//! # Beacon
//!
//! Owns every component of the protocol core and exposes the four entry
//! points the host drives:
//!
//! - [`Beacon::on_radio_frame`] for each API frame received from the radio
//! - [`Beacon::fine_tick`] every millisecond
//! - [`Beacon::coarse_tick`] at the message loop rate
//! - [`Beacon::idle`] whenever nothing else is due
//!
//! None of them block, and the host never runs two of them at once.

use crate::bridge::{DispatchContext, ProtocolBridge, StorageRequest};
use crate::config::BeaconSettings;
use crate::error::Result;
use crate::gps::{GpsDriver, GroundPosition, NavMessage, NavVelNed};
use crate::indicator::{Indicators, Led};
use crate::params::{LoadOutcome, LoadStrategy, ParameterStore, Storage, StorageLayout};
use crate::scheduler::{
    ButtonMonitor, ButtonTiming, Clock, CoarseSchedule, Flasher, LinkHealth, OperatorAction,
};
use crate::serial::Transport;
use crate::session::CraftSession;
use crate::telemetry::TelemetryRecord;
use crate::xbee::{RadioEvent, RadioLink};
use mavlink::common::MavMessage;
use mavlink::MavHeader;
use tracing::{debug, info, warn};

/// Flashes acknowledging a factory reset
pub const RESET_FLASHES: u32 = 5;

/// Flashes acknowledging a craft joining
pub const PAIRED_FLASHES: u32 = 3;

/// The beacon's protocol core
pub struct Beacon<T, G, I, S>
where
    T: Transport,
    G: GpsDriver,
    I: Indicators,
    S: Storage,
{
    settings: BeaconSettings,
    radio: RadioLink<T>,
    bridge: ProtocolBridge,
    session: CraftSession,
    health: LinkHealth,
    params: ParameterStore,
    storage: S,
    load_strategy: LoadStrategy,
    gps: G,
    leds: I,
    clock: Clock,
    schedule: CoarseSchedule,
    button: ButtonMonitor,
    flasher: Flasher,
    hold_feedback: bool,
    ground_position: Option<GroundPosition>,
    velocity: Option<NavVelNed>,
}

impl<T, G, I, S> Beacon<T, G, I, S>
where
    T: Transport,
    G: GpsDriver,
    I: Indicators,
    S: Storage,
{
    pub fn new(settings: BeaconSettings, transport: T, gps: G, leds: I, storage: S) -> Self {
        let layout = StorageLayout {
            offset: settings.storage_offset,
            version: settings.storage_version,
            max_params: settings.max_params,
        };

        Self {
            settings,
            radio: RadioLink::new(transport),
            bridge: ProtocolBridge::new(settings.system_id, settings.component_id),
            session: CraftSession::new(),
            health: LinkHealth::new(settings.link_panic_ticks, settings.gps_panic_ticks),
            params: ParameterStore::with_defaults(layout),
            storage,
            load_strategy: LoadStrategy::default(),
            gps,
            leds,
            clock: Clock::default(),
            schedule: CoarseSchedule::new(settings.heartbeat_every, settings.gps_fetch_every),
            button: ButtonMonitor::new(ButtonTiming {
                join_press_ms: settings.join_press_ms,
                reset_press_ms: settings.reset_press_ms,
                blank_ms: settings.blank_ms,
                hold_feedback_ms: settings.hold_feedback_ms,
            }),
            flasher: Flasher::default(),
            hold_feedback: false,
            ground_position: None,
            velocity: None,
        }
    }

    /// Select how stored parameters are read back
    pub fn with_load_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.load_strategy = strategy;
        self
    }

    /// Bring-up: GPS output rates and persisted parameters
    pub fn startup(&mut self) {
        self.leds.led_on(Led::Power);

        {
            let _guard = self.radio.inhibit();
            self.gps.set_rate(NavMessage::PosLlh, 1);
            self.gps.set_rate(NavMessage::Status, 3);
            self.gps.set_rate(NavMessage::VelNed, 1);
        }

        if let Err(e) = self.load_params() {
            warn!("Parameter load failed, keeping defaults: {}", e);
        }

        self.leds.led_off(Led::Power);
        info!(
            "Beacon up: sysid {}, {} parameters, loop {} Hz",
            self.settings.system_id,
            self.params.len(),
            self.settings.message_loop_hz
        );
    }

    /// Receive-complete handler for one API frame
    pub fn on_radio_frame(&mut self, frame_type: u8, data: &[u8]) {
        match self.radio.demux(frame_type, data, &mut self.session) {
            RadioEvent::Data(payload) => {
                for &byte in payload {
                    self.feed_mavlink(byte);
                }
            }
            RadioEvent::Paired { join_event: true } => self.flasher.start(PAIRED_FLASHES),
            RadioEvent::Paired { join_event: false } | RadioEvent::Handled | RadioEvent::Dropped => {}
        }
    }

    fn feed_mavlink(&mut self, byte: u8) {
        let mut decoded = self.bridge.feed_byte(byte);
        while let Some((header, msg)) = decoded {
            self.handle_mavlink(&header, &msg);
            decoded = self.bridge.next_message();
        }
    }

    fn handle_mavlink(&mut self, header: &MavHeader, msg: &MavMessage) {
        let mut ctx = DispatchContext {
            radio: &mut self.radio,
            session: &mut self.session,
            health: &mut self.health,
            params: &mut self.params,
            sys_us: self.clock.sys_us(),
        };
        let request = self.bridge.dispatch(header, msg, &mut ctx);

        let result = match request {
            Some(StorageRequest::Load) => self.load_params().map(|_| ()),
            Some(StorageRequest::Save) => self.save_params().map(|_| ()),
            None => Ok(()),
        };
        if let Err(e) = result {
            warn!("Requested parameter storage operation failed: {}", e);
        }
    }

    /// 1 ms housekeeping: time base, button, LED flashing
    pub fn fine_tick(&mut self) {
        self.clock.fine_tick();

        let level = self.leds.button_level();
        let button = self.button.tick(level);

        if button.holding && !self.hold_feedback {
            self.flasher.cancel();
            self.leds.led_on(Led::Status);
        }
        self.hold_feedback = button.holding;

        if let Some(action) = button.action {
            self.perform(action);
        }

        self.flasher.tick(self.clock.sys_ms(), &mut self.leds);
    }

    fn perform(&mut self, action: OperatorAction) {
        self.session.invalidate();
        self.health.link.reset();

        match action {
            OperatorAction::OpenJoin => {
                self.flasher.start(u32::from(self.settings.join_period_s) * 10);
                self.radio.open_join_window(self.settings.join_period_s);
            }
            OperatorAction::FactoryReset => {
                self.flasher.start(RESET_FLASHES);
                self.radio.factory_reset();
            }
        }
    }

    /// Message loop step: watchdogs, heartbeat, parameter transmit, GPS
    pub fn coarse_tick(&mut self) {
        let events = self.health.coarse_tick();
        if events.link_lost && self.session.connected {
            self.session.connected = false;
        }

        let due = self.schedule.tick();
        if due.heartbeat {
            self.bridge.send_heartbeat(&mut self.radio, &self.session);
        }

        if let Some(param) = self.params.transmit_step() {
            debug!("Sending parameter {} ({})", param.name, param.index);
            self.bridge.send_param_value(&mut self.radio, &param);
        }

        if due.gps_fetch {
            self.fetch_gps();
        }
    }

    fn fetch_gps(&mut self) {
        {
            let _guard = self.radio.inhibit();
            self.gps.fetch();
        }

        if let Some(status) = self.gps.take_status() {
            self.health.fix_status(&status);
        }

        if let Some(position) = self.gps.take_position() {
            if self.health.position() {
                self.ground_position = Some(GroundPosition::from(&position));
            }
        }

        if let Some(velocity) = self.gps.take_velocity() {
            self.velocity = Some(velocity);
        }
    }

    /// Idle-loop step: modem status and AT responses
    pub fn idle(&mut self) {
        self.radio.service_modem_status();
        if let Some(response) = self.radio.take_at_response() {
            if response.is_ok() {
                debug!("AT {} ok", String::from_utf8_lossy(&response.command));
            } else {
                warn!(
                    "AT {} failed with status {}",
                    String::from_utf8_lossy(&response.command),
                    response.status
                );
            }
        }
    }

    /// Adopt persisted parameters if they verify
    ///
    /// # Errors
    ///
    /// Returns error if the storage fails
    pub fn load_params(&mut self) -> Result<LoadOutcome> {
        self.params.load(&mut self.storage, self.load_strategy)
    }

    /// Persist parameters, returning the number of storage writes
    ///
    /// # Errors
    ///
    /// Returns error if the storage fails
    pub fn save_params(&mut self) -> Result<usize> {
        let writes = self.params.save(&mut self.storage)?;
        info!("Parameters saved ({} writes)", writes);
        Ok(writes)
    }

    pub fn session(&self) -> &CraftSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CraftSession {
        &mut self.session
    }

    pub fn health(&self) -> &LinkHealth {
        &self.health
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    pub fn radio(&self) -> &RadioLink<T> {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut RadioLink<T> {
        &mut self.radio
    }

    pub fn bridge(&self) -> &ProtocolBridge {
        &self.bridge
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Local position while the GPS has a fix
    pub fn ground_position(&self) -> Option<GroundPosition> {
        self.ground_position
    }

    /// Latest local velocity solution
    pub fn velocity(&self) -> Option<NavVelNed> {
        self.velocity
    }

    pub fn flashes_remaining(&self) -> u32 {
        self.flasher.remaining()
    }

    /// Snapshot for the telemetry log; consumes any pending status text
    pub fn telemetry_record(&mut self) -> TelemetryRecord {
        let status_text = self.session.status_text.take();
        TelemetryRecord::capture(
            self.clock.sys_ms(),
            &self.session,
            &self.health,
            self.ground_position,
            status_text.as_ref(),
        )
    }
}
