//! Rendezvous routing between one Device thread and per-endpoint Link threads.
//!
//! An [`Interface`] owns a fixed set of endpoints. One thread registers as the
//! [`Device`] and may talk to every endpoint; each endpoint is served by at
//! most one [`Link`]. Packets move through a rendezvous channel per direction:
//! a synchronous send returns only once the receiver has taken (or rejected)
//! the packet, an asynchronous send queues it and returns.
//!
//! ```no_run
//! use dlt_link::{Interface, SendMode, Timeout};
//!
//! let iface = Interface::with_endpoints(2)?;
//! let device = iface.register_device()?;
//! device.request(0, &[0xAA, 0xBB], SendMode::Async)?;
//!
//! let link = iface.register_link(0)?;
//! let mut buf = [0u8; dlt_link::MAX_PACKET_SIZE];
//! let n = link.poll(&mut buf, Timeout::millis(100))?;
//! assert_eq!(&buf[..n], &[0xAA, 0xBB]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod interface;
pub mod registry;
pub mod rendezvous;
pub mod stream;

pub use config::{InterfaceConfig, SendMode, Timeout, DEFAULT_ASYNC_BACKLOG, MAX_ENDPOINTS};
pub use dlt_frame::{MessageType, Packet, MAX_PACKET_SIZE, MAX_PAYLOAD};
pub use error::{ConfigurationError, LinkError, Result};
pub use interface::{Device, Interface, Link, Received};
pub use registry::{Binding, Party, Registry, Role};
pub use rendezvous::{Direction, SendStatus};
pub use stream::{LinkState, Step, StreamLink, StreamLinkConfig};
