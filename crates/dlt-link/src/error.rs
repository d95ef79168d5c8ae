/// Errors raised while bringing the interface up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// More endpoints requested than the interface supports.
    #[error("too many endpoints ({requested}, max {max})")]
    TooManyEndpoints { requested: usize, max: usize },

    /// An interface with no endpoints cannot route anything.
    #[error("at least one endpoint is required")]
    NoEndpoints,

    /// Asynchronous sends need room for at least one queued packet.
    #[error("async backlog must be at least 1")]
    NoAsyncBacklog,
}

/// Errors that can occur in routing operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Interface configuration error.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Packet encoding error.
    #[error("encoding error: {0}")]
    Encoding(#[from] dlt_frame::EncodingError),

    /// The endpoint id is outside the configured range.
    #[error("endpoint {endpoint} not configured ({configured} endpoints)")]
    UnknownEndpoint { endpoint: u8, configured: usize },

    /// The role was already claimed by another registration.
    #[error("{0} already registered")]
    AlreadyRegistered(String),

    /// Too many asynchronous packets are waiting for the receiver.
    #[error("endpoint {endpoint} {direction} backlog full ({capacity} pending)")]
    BacklogFull {
        endpoint: u8,
        direction: &'static str,
        capacity: usize,
    },

    /// The counterparty's handle was dropped.
    #[error("endpoint {endpoint} {direction} disconnected")]
    Disconnected {
        endpoint: u8,
        direction: &'static str,
    },
}

impl LinkError {
    /// True when the receiver rejected the packet for being larger than its buffer.
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(
            self,
            LinkError::Encoding(dlt_frame::EncodingError::ReceiverBufferTooSmall { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
