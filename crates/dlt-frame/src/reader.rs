use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_packet, log_packet, resync, FrameConfig, Packet, MAX_PACKET_SIZE};
use crate::error::{EncodingError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * MAX_PACKET_SIZE;
const READ_CHUNK_SIZE: usize = 64;

/// Reads complete packets from any `Read` stream.
///
/// Handles partial reads internally. Bytes that cannot start a packet
/// (wrong preamble, impossible length byte) are discarded until the stream
/// lines up on the next preamble.
pub struct PacketReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    discarded: u64,
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            discarded: 0,
        }
    }

    /// Read the next complete packet (blocking).
    ///
    /// Returns `Err(EncodingError::ConnectionClosed)` when EOF is reached.
    /// A read timeout on the underlying stream surfaces as an `Io` error for
    /// which [`EncodingError::is_timeout`] is true; buffered bytes are kept
    /// for the next call.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            match decode_packet(&mut self.buf) {
                Ok(Some(packet)) => {
                    log_packet("stream rx", &packet);
                    return Ok(packet);
                }
                Ok(None) => {}
                Err(EncodingError::InvalidPreamble(_)) | Err(EncodingError::PayloadTooLarge { .. }) => {
                    let skipped = resync(&mut self.buf);
                    self.discarded += skipped as u64;
                    tracing::debug!(skipped, "discarding bytes before next preamble");
                    continue;
                }
                Err(err) => return Err(err),
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(EncodingError::Io(err)),
            };

            if read == 0 {
                return Err(EncodingError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Total number of bytes discarded while hunting for a preamble.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl PacketReader<std::os::unix::net::UnixStream> {
    /// Create a packet reader for a Unix stream and apply the read timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
