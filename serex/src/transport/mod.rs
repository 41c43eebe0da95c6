//! Serial transport layer.
//!
//! This module provides the low-level console link management: a small
//! duplex byte-stream trait plus the tokio-serial implementation used
//! against real USB-to-UART console cables.

pub mod config;
mod serial;

#[cfg(test)]
pub(crate) mod mock;

pub use config::SerialSettings;
pub use serial::SerialTransport;

use async_trait::async_trait;

use crate::error::TransportError;

/// A duplex byte stream to one device console.
///
/// Write and read are fully decoupled: `write` pushes bytes at the device,
/// `bytes_available`/`read` drain whatever the device has produced since the
/// last read. Nothing here blocks waiting for the far end; pacing lives in
/// the expect engine.
#[async_trait]
pub trait Transport: Send {
    /// The physical port identifier (e.g. `/dev/cu.SLAB_USBtoUART3`).
    fn identifier(&self) -> &str;

    /// Write the given bytes to the device.
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Number of bytes currently readable without waiting.
    async fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read up to `count` bytes. Callers pass the `bytes_available` count,
    /// so this does not wait for more input to arrive.
    async fn read(&mut self, count: usize) -> Result<Vec<u8>, TransportError>;

    /// Close the port.
    async fn close(&mut self) -> Result<(), TransportError>;
}
