//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files, and deriving
//! the tick-based thresholds the protocol core runs on.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{BeaconError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub button: ButtonConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mavlink: MavlinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Serial port configuration (XBee in API mode 1)
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Radio network configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RadioConfig {
    /// How long a join window stays open, in seconds
    #[serde(default = "default_join_period_s")]
    pub join_period_s: u8,
}

/// Tick source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Coarse tick frequency
    #[serde(default = "default_message_loop_hz")]
    pub message_loop_hz: u32,

    /// Fine tick period
    #[serde(default = "default_fine_tick_ms")]
    pub fine_tick_ms: u64,
}

/// Failure detector thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct WatchdogConfig {
    /// Seconds without a craft heartbeat before the link counts as lost
    #[serde(default = "default_link_panic_s")]
    pub link_panic_s: u32,

    /// Seconds without a fixed GPS position before the fix counts as lost
    #[serde(default = "default_gps_panic_s")]
    pub gps_panic_s: u32,
}

/// Program button configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ButtonConfig {
    #[serde(default = "default_join_press_ms")]
    pub join_press_ms: u32,

    #[serde(default = "default_reset_press_ms")]
    pub reset_press_ms: u32,

    #[serde(default = "default_blank_ms")]
    pub blank_ms: u32,

    #[serde(default = "default_hold_feedback_ms")]
    pub hold_feedback_ms: u32,
}

/// Durable parameter storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,

    #[serde(default = "default_storage_offset")]
    pub offset: usize,

    /// Checksum seed; bump it to invalidate images written by an older layout
    #[serde(default = "default_storage_version")]
    pub version: u8,

    #[serde(default = "default_max_params")]
    pub max_params: usize,

    #[serde(default = "default_storage_size")]
    pub size: usize,
}

/// Local MAVLink identity
#[derive(Debug, Deserialize, Clone)]
pub struct MavlinkConfig {
    #[serde(default = "default_system_id")]
    pub system_id: u8,

    #[serde(default = "default_component_id")]
    pub component_id: u8,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for a daily-rolling log file; stdout only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

/// Telemetry snapshot log configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 57600 }

fn default_join_period_s() -> u8 { 30 }

fn default_message_loop_hz() -> u32 { 25 }
fn default_fine_tick_ms() -> u64 { 1 }

fn default_link_panic_s() -> u32 { 5 }
fn default_gps_panic_s() -> u32 { 3 }

fn default_join_press_ms() -> u32 { 3000 }
fn default_reset_press_ms() -> u32 { 15000 }
fn default_blank_ms() -> u32 { 100 }
fn default_hold_feedback_ms() -> u32 { 3000 }

fn default_storage_path() -> String { "./beacon.eeprom".to_string() }
fn default_storage_offset() -> usize { 0 }
fn default_storage_version() -> u8 { 1 }
fn default_max_params() -> usize { 64 }
fn default_storage_size() -> usize { 4096 }

fn default_system_id() -> u8 { 255 }
fn default_component_id() -> u8 { 250 }

fn default_log_level() -> String { "info".to_string() }

fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_interval_ms() -> u64 { 1000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self { port: default_serial_port(), baud_rate: default_baud_rate() }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self { join_period_s: default_join_period_s() }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            message_loop_hz: default_message_loop_hz(),
            fine_tick_ms: default_fine_tick_ms(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            link_panic_s: default_link_panic_s(),
            gps_panic_s: default_gps_panic_s(),
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            join_press_ms: default_join_press_ms(),
            reset_press_ms: default_reset_press_ms(),
            blank_ms: default_blank_ms(),
            hold_feedback_ms: default_hold_feedback_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            offset: default_storage_offset(),
            version: default_storage_version(),
            max_params: default_max_params(),
            size: default_storage_size(),
        }
    }
}

impl Default for MavlinkConfig {
    fn default() -> Self {
        Self {
            system_id: default_system_id(),
            component_id: default_component_id(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file_dir: None }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            interval_ms: default_interval_ms(),
        }
    }
}

/// Tick-domain thresholds consumed by the protocol core.
///
/// Everything here is expressed in coarse ticks, fine ticks (milliseconds) or
/// raw protocol values, so the core never touches wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconSettings {
    /// Coarse tick frequency in Hz
    pub message_loop_hz: u32,
    /// Coarse ticks without a heartbeat before LinkLost
    pub link_panic_ticks: u32,
    /// Coarse ticks without a fixed position before FixLost
    pub gps_panic_ticks: u32,
    /// Coarse ticks between outgoing heartbeats
    pub heartbeat_every: u32,
    /// A GPS fetch runs once this many coarse ticks have been exceeded
    pub gps_fetch_every: u32,
    pub join_period_s: u8,
    pub join_press_ms: u32,
    pub reset_press_ms: u32,
    pub blank_ms: u32,
    pub hold_feedback_ms: u32,
    pub system_id: u8,
    pub component_id: u8,
    pub storage_offset: usize,
    pub storage_version: u8,
    pub max_params: usize,
}

impl Default for BeaconSettings {
    fn default() -> Self {
        Config::default().settings()
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xbee_beacon::config::Config;
    ///
    /// let config = Config::load("config/beacon.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Derive the tick-domain thresholds for the protocol core
    pub fn settings(&self) -> BeaconSettings {
        let hz = self.timing.message_loop_hz;
        BeaconSettings {
            message_loop_hz: hz,
            link_panic_ticks: hz * self.watchdog.link_panic_s,
            gps_panic_ticks: hz * self.watchdog.gps_panic_s,
            heartbeat_every: hz,
            gps_fetch_every: hz / 10,
            join_period_s: self.radio.join_period_s,
            join_press_ms: self.button.join_press_ms,
            reset_press_ms: self.button.reset_press_ms,
            blank_ms: self.button.blank_ms,
            hold_feedback_ms: self.button.hold_feedback_ms,
            system_id: self.mavlink.system_id,
            component_id: self.mavlink.component_id,
            storage_offset: self.storage.offset,
            storage_version: self.storage.version,
            max_params: self.storage.max_params,
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400",
            ));
        }

        if self.radio.join_period_s == 0 || self.radio.join_period_s == 255 {
            return Err(invalid("join_period_s must be between 1 and 254"));
        }

        if self.timing.message_loop_hz < 10 || self.timing.message_loop_hz > 100 {
            return Err(invalid("message_loop_hz must be between 10 and 100"));
        }

        if self.timing.fine_tick_ms == 0 || self.timing.fine_tick_ms > 10 {
            return Err(invalid("fine_tick_ms must be between 1 and 10"));
        }

        for (name, value) in [
            ("link_panic_s", self.watchdog.link_panic_s),
            ("gps_panic_s", self.watchdog.gps_panic_s),
        ] {
            if value == 0 || value > 60 {
                return Err(invalid(format!("{} must be between 1 and 60", name)));
            }
        }

        if self.button.join_press_ms == 0 || self.button.join_press_ms >= self.button.reset_press_ms {
            return Err(invalid("join_press_ms must be non-zero and less than reset_press_ms"));
        }

        if self.button.blank_ms == 0 || self.button.blank_ms > 10000 {
            return Err(invalid("blank_ms must be between 1 and 10000"));
        }

        if self.button.hold_feedback_ms == 0 {
            return Err(invalid("hold_feedback_ms must be greater than 0"));
        }

        if self.storage.path.is_empty() {
            return Err(invalid("storage path cannot be empty"));
        }

        if self.storage.max_params == 0 {
            return Err(invalid("max_params must be greater than 0"));
        }

        let block_end = self
            .storage
            .max_params
            .checked_mul(4)
            .and_then(|n| n.checked_add(2))
            .and_then(|n| n.checked_add(self.storage.offset));
        match block_end {
            Some(end) if end <= self.storage.size => {}
            Some(_) => return Err(invalid("storage size too small for offset and max_params")),
            None => return Err(invalid("storage offset and max_params overflow")),
        }

        if self.logging.level.is_empty() {
            return Err(invalid("logging level cannot be empty"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.interval_ms == 0 || self.telemetry.interval_ms > 60000 {
            return Err(invalid("telemetry interval_ms must be between 1 and 60000"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> BeaconError {
    BeaconError::Config(toml::de::Error::custom(msg))
}
