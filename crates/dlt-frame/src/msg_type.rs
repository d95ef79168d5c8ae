//! Message type tags.
//!
//! The routing layer relays the tag without interpreting it. Only the two
//! values below are produced by the Device side; Links may relay any byte.

use std::fmt;

/// Opaque message type carried in byte 1 of every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageType(pub u8);

impl MessageType {
    /// A request originated by the sender.
    pub const REQUEST: MessageType = MessageType(0x01);

    /// A response to an earlier request.
    pub const RESPONSE: MessageType = MessageType(0x02);

    /// Raw tag byte.
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Returns a human-readable name for the tag.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::REQUEST => "REQUEST",
            MessageType::RESPONSE => "RESPONSE",
            _ => "UNKNOWN",
        }
    }

    /// Returns true for the two tags the Device emits.
    pub fn is_known(self) -> bool {
        matches!(self, MessageType::REQUEST | MessageType::RESPONSE)
    }
}

impl From<u8> for MessageType {
    fn from(tag: u8) -> Self {
        MessageType(tag)
    }
}

impl From<MessageType> for u8 {
    fn from(ty: MessageType) -> Self {
        ty.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.0, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(MessageType::REQUEST.name(), "REQUEST");
        assert_eq!(MessageType::RESPONSE.name(), "RESPONSE");
        assert_eq!(MessageType(9).name(), "UNKNOWN");
        assert!(!MessageType(0).is_known());
    }

    #[test]
    fn display_includes_hex_and_name() {
        assert_eq!(MessageType::RESPONSE.to_string(), "0x02 (RESPONSE)");
    }
}
