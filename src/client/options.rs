//! Client connection and policy options.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use random_table::client::{ClientOptions, ConfigPolicy};
//!
//! let options = ClientOptions::new("random-server")
//!     .with_connect_timeout(Duration::from_secs(2))
//!     .with_config_policy(ConfigPolicy::ReuseLastKnownGood);
//!
//! assert_eq!(options.server_addr(), "random-server:3215");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_PORT;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable naming the server.
pub const SERVER_ENV: &str = "RANDOM_SERVER";

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for one full response.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on a single response.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// ConfigPolicy
// ============================================================================

/// What a cycle does when the configuration store cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigPolicy {
    /// Fail the cycle with `ConfigUnavailable`.
    #[default]
    Abort,
    /// Reuse the parameters of the last cycle whose configuration was read
    /// and validated. Still fails when there is none.
    ReuseLastKnownGood,
}

// ============================================================================
// ClientOptions
// ============================================================================

/// Options for a [`TableClient`](super::TableClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Server as `host` or `host:port`.
    pub server: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Time allowed for writing a request and reading its full response.
    pub response_timeout: Duration,
    /// Largest response accepted.
    pub max_response_bytes: usize,
    /// Behavior when the store is unavailable.
    pub config_policy: ConfigPolicy,
}

impl ClientOptions {
    /// Creates options for `server` with default limits.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            config_policy: ConfigPolicy::default(),
        }
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Sets the response timeout.
    #[inline]
    #[must_use]
    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    /// Sets the response size cap.
    #[inline]
    #[must_use]
    pub fn with_max_response_bytes(mut self, max_response_bytes: usize) -> Self {
        self.max_response_bytes = max_response_bytes;
        self
    }

    /// Sets the configuration policy.
    #[inline]
    #[must_use]
    pub fn with_config_policy(mut self, policy: ConfigPolicy) -> Self {
        self.config_policy = policy;
        self
    }

    /// Server address with the default port filled in.
    #[must_use]
    pub fn server_addr(&self) -> String {
        with_default_port(&self.server)
    }

    /// Checks the options for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first bad option.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::config(format!(
                "no server given (set --server or {SERVER_ENV})"
            )));
        }
        if self.connect_timeout.is_zero() || self.response_timeout.is_zero() {
            return Err(Error::config("client timeouts must be non-zero"));
        }
        if self.max_response_bytes == 0 {
            return Err(Error::config("max_response_bytes must be at least 1"));
        }
        Ok(())
    }
}

/// Appends [`DEFAULT_PORT`] when `server` names no port.
///
/// Accepts `host`, `host:port`, bare IPv4/IPv6 addresses and `[v6]:port`.
#[must_use]
pub fn with_default_port(server: &str) -> String {
    let server = server.trim();

    if server.parse::<SocketAddr>().is_ok() {
        return server.to_string();
    }
    if let Ok(ip) = server.trim_matches(['[', ']']).parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_PORT).to_string();
    }
    if let Some((host, port)) = server.rsplit_once(':')
        && !host.is_empty()
        && port.parse::<u16>().is_ok()
    {
        return server.to_string();
    }

    format!("{server}:{DEFAULT_PORT}")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_appended() {
        assert_eq!(with_default_port("random-server"), "random-server:3215");
        assert_eq!(with_default_port("10.0.0.7"), "10.0.0.7:3215");
        assert_eq!(with_default_port("::1"), "[::1]:3215");
        assert_eq!(with_default_port("[::1]"), "[::1]:3215");
    }

    #[test]
    fn test_explicit_port_kept() {
        assert_eq!(with_default_port("random-server:9000"), "random-server:9000");
        assert_eq!(with_default_port("127.0.0.1:80"), "127.0.0.1:80");
        assert_eq!(with_default_port("[::1]:4000"), "[::1]:4000");
    }

    #[test]
    fn test_defaults() {
        let options = ClientOptions::new("host");
        assert_eq!(options.max_response_bytes, DEFAULT_MAX_RESPONSE_BYTES);
        assert_eq!(options.config_policy, ConfigPolicy::Abort);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_server() {
        let err = ClientOptions::new("  ").validate().expect_err("empty");
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains(SERVER_ENV));
    }

    #[test]
    fn test_builder_methods() {
        let options = ClientOptions::new("host")
            .with_connect_timeout(Duration::from_millis(10))
            .with_response_timeout(Duration::from_millis(20))
            .with_max_response_bytes(100)
            .with_config_policy(ConfigPolicy::ReuseLastKnownGood);

        assert_eq!(options.connect_timeout, Duration::from_millis(10));
        assert_eq!(options.response_timeout, Duration::from_millis(20));
        assert_eq!(options.max_response_bytes, 100);
        assert_eq!(options.config_policy, ConfigPolicy::ReuseLastKnownGood);
    }
}
