use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{EncodingError, Result};
use crate::msg_type::MessageType;

/// Packet header: preamble (1) + message type (1) + payload length (1) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Preamble byte that opens every packet.
pub const PREAMBLE: u8 = 0x77;

/// Largest packet on the wire, header included.
pub const MAX_PACKET_SIZE: usize = 50;

/// Largest payload a single packet can carry.
pub const MAX_PAYLOAD: usize = MAX_PACKET_SIZE - HEADER_SIZE;

/// A framed packet, stored inline.
///
/// The backing array is always `MAX_PACKET_SIZE` bytes so moving a packet
/// between threads never allocates.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    buf: [u8; MAX_PACKET_SIZE],
    len: u8,
}

/// The decoded 3-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Opaque message type tag.
    pub message_type: MessageType,
    /// Payload length announced by the header.
    pub payload_len: usize,
}

impl PacketHeader {
    /// The total wire size announced by this header.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload_len
    }
}

impl Packet {
    /// Frame `payload` with the given message type.
    pub fn new(message_type: MessageType, payload: &[u8]) -> Result<Self> {
        encode(message_type, payload)
    }

    /// Validate and copy an already framed packet.
    ///
    /// Checks the preamble, the size limits, and that the length byte agrees
    /// with the number of payload bytes supplied.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(EncodingError::PayloadTooLarge {
                size: bytes.len().saturating_sub(HEADER_SIZE),
                max: MAX_PAYLOAD,
            });
        }
        let header = decode(bytes)?;
        if bytes[0] != PREAMBLE {
            return Err(EncodingError::InvalidPreamble(bytes[0]));
        }
        let actual = bytes.len() - HEADER_SIZE;
        if header.payload_len != actual {
            return Err(EncodingError::LengthMismatch {
                declared: header.payload_len,
                actual,
            });
        }

        let mut buf = [0u8; MAX_PACKET_SIZE];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            buf,
            len: bytes.len() as u8,
        })
    }

    /// The message type tag.
    pub fn message_type(&self) -> MessageType {
        MessageType(self.buf[1])
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.buf[HEADER_SIZE..self.len as usize]
    }

    /// Number of payload bytes.
    pub fn payload_len(&self) -> usize {
        self.len as usize - HEADER_SIZE
    }

    /// The whole packet as it appears on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    /// The total wire size of this packet (header + payload).
    pub fn wire_size(&self) -> usize {
        self.len as usize
    }

    /// The decoded header.
    pub fn header(&self) -> PacketHeader {
        PacketHeader {
            message_type: self.message_type(),
            payload_len: self.payload_len(),
        }
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("message_type", &self.message_type())
            .field("payload_len", &self.payload_len())
            .field("payload", &format_args!("{}", to_hex(self.payload())))
            .finish()
    }
}

/// Encode a payload into a packet.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬──────────┬──────────────────┐
/// │ Preamble │ Type     │ Length   │ Payload          │
/// │ 0x77     │ (1B)     │ (1B)     │ (0..=47 bytes)   │
/// └──────────┴──────────┴──────────┴──────────────────┘
/// ```
pub fn encode(message_type: MessageType, payload: &[u8]) -> Result<Packet> {
    if payload.len() > MAX_PAYLOAD {
        return Err(EncodingError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut buf = [0u8; MAX_PACKET_SIZE];
    buf[0] = PREAMBLE;
    buf[1] = message_type.as_u8();
    buf[2] = payload.len() as u8;
    buf[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);

    Ok(Packet {
        buf,
        len: (HEADER_SIZE + payload.len()) as u8,
    })
}

/// Decode the header of a packet.
///
/// The header is trusted as-is; only its presence is checked.
pub fn decode(bytes: &[u8]) -> Result<PacketHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(EncodingError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    Ok(PacketHeader {
        message_type: MessageType(bytes[1]),
        payload_len: bytes[2] as usize,
    })
}

/// Decode a packet and copy its payload into `dst`.
///
/// Fails with `ReceiverBufferTooSmall` when the payload does not fit; `dst`
/// is left untouched in that case.
pub fn decode_into(bytes: &[u8], dst: &mut [u8]) -> Result<PacketHeader> {
    let header = decode(bytes)?;
    if header.payload_len > dst.len() {
        return Err(EncodingError::ReceiverBufferTooSmall {
            needed: header.payload_len,
            capacity: dst.len(),
        });
    }
    if bytes.len() < header.wire_size() {
        return Err(EncodingError::Truncated {
            expected: header.wire_size(),
            actual: bytes.len(),
        });
    }

    dst[..header.payload_len].copy_from_slice(&bytes[HEADER_SIZE..header.wire_size()]);
    Ok(header)
}

/// Encode a packet straight into a stream buffer.
pub fn encode_packet(message_type: MessageType, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(EncodingError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(PREAMBLE);
    dst.put_u8(message_type.as_u8());
    dst.put_u8(payload.len() as u8);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a packet from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete packet yet.
/// On success, consumes the packet bytes from the buffer.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Packet>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0] != PREAMBLE {
        return Err(EncodingError::InvalidPreamble(src[0]));
    }

    let payload_len = src[2] as usize;
    if payload_len > MAX_PAYLOAD {
        return Err(EncodingError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        return Ok(None);
    }

    let packet = Packet::from_bytes(&src[..total])?;
    src.advance(total);
    Ok(Some(packet))
}

/// Drop bytes up to the next preamble candidate.
///
/// Always drops at least one byte when the buffer is non-empty, so a bad
/// header sitting at the front is skipped. Returns the number of bytes dropped.
pub fn resync(src: &mut BytesMut) -> usize {
    if src.is_empty() {
        return 0;
    }
    let skip = src[1..]
        .iter()
        .position(|&b| b == PREAMBLE)
        .map(|pos| pos + 1)
        .unwrap_or(src.len());
    src.advance(skip);
    skip
}

/// Log a packet's header fields at `debug` level, and the payload at `trace`.
pub fn log_packet(context: &str, packet: &Packet) {
    tracing::debug!(
        context,
        msg_type = %packet.message_type(),
        length = packet.payload_len(),
        "dlt packet"
    );
    tracing::trace!(context, payload = %to_hex(packet.payload()), "dlt payload");
}

/// Lower-case hex rendering without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Configuration for stream packet I/O.
#[derive(Debug, Clone, Default)]
pub struct FrameConfig {
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}
