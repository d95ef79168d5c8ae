//! DLT packet framing.
//!
//! Every packet is framed with:
//! - A 1-byte preamble (`0x77`)
//! - A 1-byte opaque message type tag
//! - A 1-byte payload length (0..=47)
//!
//! A packet never exceeds 50 bytes on the wire and is stored inline, so
//! framing never allocates. [`PacketReader`] and [`PacketWriter`] carry
//! packets over byte streams for Links whose medium is serial or a socket.

pub mod codec;
pub mod error;
pub mod msg_type;
pub mod reader;
pub mod writer;

pub use codec::{
    decode, decode_into, decode_packet, encode, encode_packet, log_packet, resync, to_hex,
    FrameConfig, Packet, PacketHeader, HEADER_SIZE, MAX_PACKET_SIZE, MAX_PAYLOAD, PREAMBLE,
};
pub use error::{EncodingError, Result};
pub use msg_type::MessageType;
pub use reader::PacketReader;
pub use writer::PacketWriter;
