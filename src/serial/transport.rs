//! Bus transport contract and the scoped Transport Guard.
//!
//! The radio shares its serial line with everything else on the board, so any
//! transaction touching it (a send, a GPS fetch) runs with radio receive
//! masked. [`TransportGuard`] masks on acquisition and restores on drop, so
//! every exit path releases the bus.

use bytes::{Bytes, BytesMut};
use std::io;
use std::ops::{Deref, DerefMut};

/// Byte transport to the radio module with receive masking
pub trait Transport {
    /// Queue a complete radio frame for transmission
    fn write(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Mask radio receive processing
    fn inhibit(&mut self);

    /// Undo one [`Transport::inhibit`]
    fn allow(&mut self);
}

/// Scoped bus exclusion: receive stays masked while the guard lives
pub struct TransportGuard<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> TransportGuard<'a, T> {
    pub fn acquire(transport: &'a mut T) -> Self {
        transport.inhibit();
        Self { transport }
    }
}

impl<T: Transport + ?Sized> Deref for TransportGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.transport
    }
}

impl<T: Transport + ?Sized> DerefMut for TransportGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.transport
    }
}

impl<T: Transport + ?Sized> Drop for TransportGuard<'_, T> {
    fn drop(&mut self) {
        self.transport.allow();
    }
}

/// Host-side transport: frames are queued for the async serial writer, and
/// bytes received while masked are parked until the mask is released.
#[derive(Debug, Default)]
pub struct BufferedTransport {
    tx: BytesMut,
    rx_backlog: BytesMut,
    inhibit_depth: u32,
}

impl BufferedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_inhibited(&self) -> bool {
        self.inhibit_depth > 0
    }

    /// Drain everything queued for transmission
    pub fn take_tx(&mut self) -> Bytes {
        self.tx.split().freeze()
    }

    pub fn has_tx(&self) -> bool {
        !self.tx.is_empty()
    }

    /// Hold received bytes while receive is masked
    pub fn park_rx(&mut self, data: &[u8]) {
        self.rx_backlog.extend_from_slice(data);
    }

    /// Drain parked receive bytes
    pub fn take_rx_backlog(&mut self) -> BytesMut {
        self.rx_backlog.split()
    }
}

impl Transport for BufferedTransport {
    fn write(&mut self, frame: &[u8]) -> io::Result<()> {
        self.tx.extend_from_slice(frame);
        Ok(())
    }

    fn inhibit(&mut self) {
        self.inhibit_depth += 1;
    }

    fn allow(&mut self) {
        self.inhibit_depth = self.inhibit_depth.saturating_sub(1);
    }
}
