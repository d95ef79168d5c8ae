//! Endpoint bindings.
//!
//! Each role is claimed exactly once, from the thread that will play it.
//! After startup the registry is only read (for diagnostics and logging).

use std::fmt;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

use crate::error::{LinkError, Result};

/// A registered thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Party {
    /// Identity of the registering thread.
    pub thread: ThreadId,
    /// Name of the registering thread, if it had one.
    pub name: Option<String>,
}

impl Party {
    fn current() -> Self {
        let current = thread::current();
        Self {
            thread: current.id(),
            name: current.name().map(str::to_string),
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{:?}", self.thread),
        }
    }
}

/// The role a binding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Device,
    Link(u8),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Device => write!(f, "device"),
            Role::Link(endpoint) => write!(f, "link[{endpoint}]"),
        }
    }
}

/// One row of [`Registry::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub role: Role,
    pub party: Option<Party>,
}

/// Device and per-endpoint Link registrations.
#[derive(Debug)]
pub struct Registry {
    device: OnceLock<Party>,
    links: Vec<OnceLock<Party>>,
}

impl Registry {
    pub(crate) fn new(num_endpoints: usize) -> Self {
        Self {
            device: OnceLock::new(),
            links: (0..num_endpoints).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Number of configured endpoints.
    pub fn num_endpoints(&self) -> usize {
        self.links.len()
    }

    /// The registered Device, if any.
    pub fn device(&self) -> Option<&Party> {
        self.device.get()
    }

    /// The Link registered on `endpoint`, if any.
    pub fn link(&self, endpoint: u8) -> Option<&Party> {
        self.links.get(endpoint as usize).and_then(OnceLock::get)
    }

    /// Every binding, Device first, then Links in endpoint order.
    pub fn snapshot(&self) -> Vec<Binding> {
        let mut rows = Vec::with_capacity(self.links.len() + 1);
        rows.push(Binding {
            role: Role::Device,
            party: self.device.get().cloned(),
        });
        for (endpoint, slot) in self.links.iter().enumerate() {
            rows.push(Binding {
                role: Role::Link(endpoint as u8),
                party: slot.get().cloned(),
            });
        }
        rows
    }

    pub(crate) fn check_endpoint(&self, endpoint: u8) -> Result<usize> {
        let index = endpoint as usize;
        if index >= self.links.len() {
            return Err(LinkError::UnknownEndpoint {
                endpoint,
                configured: self.links.len(),
            });
        }
        Ok(index)
    }

    pub(crate) fn bind_device(&self) -> Result<&Party> {
        bind(&self.device, Role::Device)
    }

    pub(crate) fn bind_link(&self, endpoint: u8) -> Result<&Party> {
        let index = self.check_endpoint(endpoint)?;
        bind(&self.links[index], Role::Link(endpoint))
    }
}

fn bind(slot: &OnceLock<Party>, role: Role) -> Result<&Party> {
    let mut claimed = false;
    let party = slot.get_or_init(|| {
        claimed = true;
        Party::current()
    });
    if !claimed {
        return Err(LinkError::AlreadyRegistered(format!("{role} (held by {party})")));
    }
    tracing::info!(%role, %party, "registered");
    Ok(party)
}
