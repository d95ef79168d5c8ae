//! Device Link Transfer.
//!
//! DLT moves small framed packets between one Device thread (the
//! application logic) and a fixed set of Link threads, one per endpoint,
//! each owning some transport such as a UART or a BLE service.
//!
//! # Crate Structure
//!
//! - [`frame`]: the 3-byte header wire format, stream reader and writer
//! - [`link`]: endpoint registry, rendezvous channels, routing handles, stream links

/// Re-export framing types.
pub mod frame {
    pub use dlt_frame::*;
}

/// Re-export routing types.
pub mod link {
    pub use dlt_link::*;
}
