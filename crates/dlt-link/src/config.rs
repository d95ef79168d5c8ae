use std::time::{Duration, Instant};

use crate::error::ConfigurationError;

/// Maximum number of endpoints an interface can be initialised with.
pub const MAX_ENDPOINTS: usize = 8;

/// Default bound on asynchronous packets waiting in one direction of an endpoint.
pub const DEFAULT_ASYNC_BACKLOG: usize = 8;

/// Interface configuration, supplied once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceConfig {
    /// Number of endpoints to allocate. Must be in `1..=MAX_ENDPOINTS`.
    pub num_endpoints: usize,
    /// Asynchronous sends accepted per direction before `BacklogFull`. Must be at least 1.
    pub async_backlog: usize,
}

impl InterfaceConfig {
    /// Configuration with `num_endpoints` endpoints and default limits.
    pub fn with_endpoints(num_endpoints: usize) -> Self {
        Self {
            num_endpoints,
            ..Self::default()
        }
    }

    /// Check the configuration against the compiled limits.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.num_endpoints > MAX_ENDPOINTS {
            return Err(ConfigurationError::TooManyEndpoints {
                requested: self.num_endpoints,
                max: MAX_ENDPOINTS,
            });
        }
        if self.num_endpoints == 0 {
            return Err(ConfigurationError::NoEndpoints);
        }
        if self.async_backlog == 0 {
            return Err(ConfigurationError::NoAsyncBacklog);
        }
        Ok(())
    }
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            num_endpoints: 1,
            async_backlog: DEFAULT_ASYNC_BACKLOG,
        }
    }
}

/// How long a receive may suspend the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wait until data arrives.
    Forever,
    /// Check once and return immediately.
    NoWait,
    /// Wait at most this long.
    After(Duration),
}

impl Timeout {
    /// Shorthand for `Timeout::After(Duration::from_millis(ms))`.
    pub fn millis(ms: u64) -> Self {
        Timeout::After(Duration::from_millis(ms))
    }

    /// Absolute deadline for this timeout, `None` meaning no deadline.
    pub fn deadline(self) -> Option<Instant> {
        let now = Instant::now();
        match self {
            Timeout::Forever => None,
            Timeout::NoWait => Some(now),
            Timeout::After(d) => now.checked_add(d),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Timeout::NoWait
        } else {
            Timeout::After(d)
        }
    }
}

/// Whether a send waits for the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Block until the receiver takes (or rejects) the packet.
    Sync,
    /// Hand the packet to the channel and return at once.
    Async,
}

impl SendMode {
    /// Map the conventional `async` flag onto a mode.
    pub fn from_async(is_async: bool) -> Self {
        if is_async {
            SendMode::Async
        } else {
            SendMode::Sync
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SendMode::Sync => "sync",
            SendMode::Async => "async",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_limits() {
        assert!(InterfaceConfig::with_endpoints(MAX_ENDPOINTS).validate().is_ok());
        assert_eq!(
            InterfaceConfig::with_endpoints(MAX_ENDPOINTS + 1).validate(),
            Err(ConfigurationError::TooManyEndpoints {
                requested: MAX_ENDPOINTS + 1,
                max: MAX_ENDPOINTS
            })
        );
        assert_eq!(
            InterfaceConfig::with_endpoints(0).validate(),
            Err(ConfigurationError::NoEndpoints)
        );
        assert_eq!(
            InterfaceConfig {
                num_endpoints: 1,
                async_backlog: 0,
            }
            .validate(),
            Err(ConfigurationError::NoAsyncBacklog)
        );
    }

    #[test]
    fn zero_duration_is_no_wait() {
        assert_eq!(Timeout::from(Duration::ZERO), Timeout::NoWait);
        assert_eq!(Timeout::from(Duration::from_millis(5)), Timeout::millis(5));
        assert!(Timeout::Forever.deadline().is_none());
        assert!(Timeout::After(Duration::MAX).deadline().is_none());
    }

    #[test]
    fn send_mode_from_flag() {
        assert_eq!(SendMode::from_async(true), SendMode::Async);
        assert_eq!(SendMode::from_async(false), SendMode::Sync);
    }
}
