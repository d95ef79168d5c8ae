/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    /// The payload does not fit in a single packet.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The waiting packet does not fit in the receiver's buffer.
    #[error("receiver buffer too small ({needed} bytes needed, capacity {capacity})")]
    ReceiverBufferTooSmall { needed: usize, capacity: usize },

    /// The first byte is not the DLT preamble.
    #[error("invalid packet preamble 0x{0:02X} (expected 0x77)")]
    InvalidPreamble(u8),

    /// Fewer bytes than the header requires.
    #[error("truncated packet ({actual} bytes, need at least {expected})")]
    Truncated { expected: usize, actual: usize },

    /// The header's length byte disagrees with the bytes supplied.
    #[error("length byte says {declared} payload bytes, packet carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// An I/O error occurred while reading or writing packets.
    #[error("packet I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete packet was received.
    #[error("connection closed (incomplete packet)")]
    ConnectionClosed,
}

impl EncodingError {
    /// True for I/O errors produced by an expired read or write timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            EncodingError::Io(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, EncodingError>;
