//! # Serial Communication Module
//!
//! Handles serial communication with the XBee radio module.
//!
//! This module handles:
//! - Opening the serial port (8N1, no flow control) at the configured baud rate
//! - Async read/write operations for the host runner
//! - The synchronous [`Transport`] contract the protocol core sends through,
//!   with its scoped receive mask ([`TransportGuard`])

pub mod port_trait;
pub mod transport;

pub use port_trait::{SerialPortIO, TokioSerialPort};
pub use transport::{BufferedTransport, Transport, TransportGuard};

use crate::config::SerialConfig;
use crate::error::{BeaconError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Fallback XBee device paths to try after the configured one
const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyUSB0", // FTDI-based XBee adapters
    "/dev/ttyACM0", // USB CDC adapters
];

/// XBee serial port handler
///
/// Manages the connection to the local radio module.
pub struct RadioSerial<P: SerialPortIO = TokioSerialPort> {
    /// Serial port handle
    port: P,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl<P: SerialPortIO> std::fmt::Debug for RadioSerial<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioSerial")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl RadioSerial<TokioSerialPort> {
    /// Open the configured port, falling back to the default device paths
    ///
    /// # Errors
    ///
    /// Returns error if no radio device could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xbee_beacon::config::SerialConfig;
    /// use xbee_beacon::serial::RadioSerial;
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let serial = RadioSerial::open(&SerialConfig::default())?;
    ///     println!("Radio at {}", serial.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let mut paths: Vec<&str> = vec![config.port.as_str()];
        for path in DEFAULT_DEVICE_PATHS {
            if !paths.contains(path) {
                paths.push(path);
            }
        }
        Self::open_with_paths(&paths, config.baud_rate)
    }

    /// Open the first of `paths` that succeeds
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened XBee radio at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port: TokioSerialPort::new(port),
                        device_path: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(BeaconError::SerialPortNotFound(paths.join(", ")))
    }

    /// Open a specific serial port with XBee settings (8N1, no flow control)
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| BeaconError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }
}

impl<P: SerialPortIO> RadioSerial<P> {
    /// Wrap an already opened port
    pub fn from_port(port: P, device_path: impl Into<String>) -> Self {
        Self {
            port,
            device_path: device_path.into(),
        }
    }

    /// Write queued radio frames to the module
    pub async fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.port
            .write_all(packet)
            .await
            .map_err(|e| BeaconError::Serial(format!("Failed to write packet: {}", e)))?;

        self.port
            .flush()
            .await
            .map_err(|e| BeaconError::Serial(format!("Failed to flush serial port: {}", e)))?;

        debug!("Sent {} bytes to radio", packet.len());
        Ok(())
    }

    /// Read whatever the module has sent
    pub async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.port
            .read(buf)
            .await
            .map_err(|e| BeaconError::Serial(format!("Failed to read: {}", e)))
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[cfg(test)]
mod tests {
    use super::port_trait::mocks::MockSerialPort;
    use super::*;
    use std::io;

    #[test]
    fn test_device_path_order() {
        assert_eq!(DEFAULT_DEVICE_PATHS[0], "/dev/ttyUSB0");
        assert_eq!(DEFAULT_DEVICE_PATHS[1], "/dev/ttyACM0");
    }

    #[test]
    fn test_open_with_invalid_paths_returns_error() {
        let invalid_paths = &["/dev/nonexistent0", "/dev/nonexistent1"];
        let result = RadioSerial::open_with_paths(invalid_paths, 57600);

        match result.unwrap_err() {
            BeaconError::SerialPortNotFound(msg) => {
                assert!(msg.contains("/dev/nonexistent0"));
                assert!(msg.contains("/dev/nonexistent1"));
            }
            other => panic!("Expected SerialPortNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_empty_paths_returns_error() {
        let empty_paths: &[&str] = &[];
        let result = RadioSerial::open_with_paths(empty_paths, 57600);
        assert!(matches!(result, Err(BeaconError::SerialPortNotFound(_))));
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let result = RadioSerial::open_port("/dev/nonexistent_serial_device_12345", 57600);

        match result.unwrap_err() {
            BeaconError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_serial_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[test]
    fn test_send_packet_writes_to_port() {
        let port = MockSerialPort::new();
        let mut serial = RadioSerial::from_port(port.clone(), "mock");

        tokio_test::block_on(serial.send_packet(&[0x7E, 0x00, 0x01, 0x08, 0xF7])).unwrap();

        assert_eq!(port.get_written_data(), vec![vec![0x7E, 0x00, 0x01, 0x08, 0xF7]]);
    }

    #[test]
    fn test_send_packet_write_error() {
        let port = MockSerialPort::new();
        port.set_write_error(io::ErrorKind::BrokenPipe);
        let mut serial = RadioSerial::from_port(port, "mock");

        let result = tokio_test::block_on(serial.send_packet(&[0x7E]));
        assert!(matches!(result, Err(BeaconError::Serial(_))));
    }

    #[test]
    fn test_send_packet_flush_error() {
        let port = MockSerialPort::new();
        port.set_flush_error(io::ErrorKind::TimedOut);
        let mut serial = RadioSerial::from_port(port, "mock");

        let result = tokio_test::block_on(serial.send_packet(&[0x7E]));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_chunk_splits_long_reads() {
        let port = MockSerialPort::new();
        port.push_read(&[1, 2, 3, 4, 5]);
        let mut serial = RadioSerial::from_port(port, "mock");

        let mut buf = [0u8; 3];
        let n = tokio_test::block_on(serial.read_chunk(&mut buf)).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);

        let n = tokio_test::block_on(serial.read_chunk(&mut buf)).unwrap();
        assert_eq!(&buf[..n], &[4, 5]);
    }

    #[test]
    fn test_device_path() {
        let serial = RadioSerial::from_port(MockSerialPort::new(), "/dev/ttyUSB3");
        assert_eq!(serial.device_path(), "/dev/ttyUSB3");
    }
}
