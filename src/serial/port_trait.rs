//! Async seam between [`super::RadioSerial`] and the physical port, so the
//! radio's serial handling can run against an in-memory port in tests.

use async_trait::async_trait;
use std::io;

/// Byte-level port the radio is attached to
#[async_trait]
pub trait SerialPortIO: Send {
    /// Read whatever the radio has sent, up to `buf.len()` bytes
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write a run of API frames
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    async fn flush(&mut self) -> io::Result<()>;
}

/// [`SerialPortIO`] over a `tokio_serial::SerialStream`
pub struct TokioSerialPort {
    stream: tokio_serial::SerialStream,
}

impl TokioSerialPort {
    pub fn new(stream: tokio_serial::SerialStream) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        tokio::io::AsyncReadExt::read(&mut self.stream, buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        tokio::io::AsyncWriteExt::write_all(&mut self.stream, data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        tokio::io::AsyncWriteExt::flush(&mut self.stream).await
    }
}
