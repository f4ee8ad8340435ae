//! # Error Types
//!
//! Custom error types for the XBee beacon using `thiserror`.
//!
//! Only the outer surfaces (configuration, serial port, durable storage,
//! telemetry files) report errors. The protocol core drops malformed input
//! instead of returning it.

use thiserror::Error;

/// Main error type for the beacon
#[derive(Debug, Error)]
pub enum BeaconError {
    /// XBee API framing errors
    #[error("XBee protocol error: {0}")]
    XbeeProtocol(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial devices could be opened
    #[error("No radio serial device found (tried: {0})")]
    SerialPortNotFound(String),

    /// Durable parameter storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for the beacon
pub type Result<T> = std::result::Result<T, BeaconError>;
