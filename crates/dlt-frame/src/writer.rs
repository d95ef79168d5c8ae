use std::io::{ErrorKind, Write};

use crate::codec::{encode, log_packet, FrameConfig, Packet};
use crate::error::{EncodingError, Result};
use crate::msg_type::MessageType;

/// Writes complete packets to any `Write` stream.
pub struct PacketWriter<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Write> PacketWriter<T> {
    /// Create a new packet writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Frame and send a payload.
    pub fn send(&mut self, message_type: MessageType, payload: &[u8]) -> Result<()> {
        let packet = encode(message_type, payload)?;
        self.write_packet(&packet)
    }

    /// Write a complete packet (blocking).
    ///
    /// With a write timeout configured, a stream that stays full past it
    /// fails with a timeout error instead of being retried.
    pub fn write_packet(&mut self, packet: &Packet) -> Result<()> {
        log_packet("stream tx", packet);
        let bytes = packet.as_bytes();

        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(EncodingError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if self.should_retry(&err) => continue,
                Err(err) => return Err(EncodingError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if self.should_retry(&err) => continue,
                Err(err) => return Err(EncodingError::Io(err)),
            }
        }
    }

    // Once a write timeout is set, `WouldBlock` means it expired.
    fn should_retry(&self, err: &std::io::Error) -> bool {
        match err.kind() {
            ErrorKind::Interrupted => true,
            ErrorKind::WouldBlock => self.config.write_timeout.is_none(),
            _ => false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl PacketWriter<std::os::unix::net::UnixStream> {
    /// Create a packet writer for a Unix stream and apply the write timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
