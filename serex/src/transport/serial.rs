//! Serial transport implementation using tokio-serial.

use async_trait::async_trait;
use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

use super::Transport;
use super::config::SerialSettings;
use crate::error::TransportError;

/// Serial console transport wrapping a tokio-serial stream.
pub struct SerialTransport {
    port: SerialStream,
    identifier: String,
}

impl SerialTransport {
    /// Open the given port with the fixed console link settings.
    ///
    /// Open failures (port busy, driver missing, cable unplugged) are
    /// returned as [`TransportError::OpenFailed`] so discovery can skip the
    /// candidate instead of aborting.
    pub fn open(identifier: &str) -> Result<Self, TransportError> {
        Self::open_with(identifier, SerialSettings::default())
    }

    /// Open the given port with explicit settings.
    pub fn open_with(identifier: &str, settings: SerialSettings) -> Result<Self, TransportError> {
        let builder = tokio_serial::new(identifier, settings.baud_rate)
            .data_bits(settings.data_bits)
            .parity(settings.parity)
            .stop_bits(settings.stop_bits);

        let port = builder
            .open_native_async()
            .map_err(|e| TransportError::OpenFailed {
                port: identifier.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            "opened {} at {} baud 8N1",
            identifier, settings.baud_rate
        );

        Ok(Self {
            port,
            identifier: identifier.to_string(),
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data).await?;
        self.port.flush().await?;
        trace!("{}: wrote {} bytes", self.identifier, data.len());
        Ok(())
    }

    async fn bytes_available(&mut self) -> Result<usize, TransportError> {
        let available = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::Unavailable {
                port: self.identifier.clone(),
                source: std::io::Error::other(e),
            })?;
        Ok(available as usize)
    }

    async fn read(&mut self, count: usize) -> Result<Vec<u8>, TransportError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut data = vec![0u8; count];
        let mut filled = 0;
        while filled < count {
            let n = self.port.read(&mut data[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        trace!("{}: read {} bytes", self.identifier, filled);
        Ok(data)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.port.shutdown().await?;
        debug!("closed {}", self.identifier);
        Ok(())
    }
}
