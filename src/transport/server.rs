//! TCP server accepting table sessions.
//!
//! # Accept Loop
//!
//! 1. Wait for a free session slot (bounded by [`ServerConfig::max_sessions`])
//! 2. Accept one TCP connection
//! 3. Spawn a [`Session`] holding the slot until it closes
//!
//! Sessions are independent: one stalled peer never blocks another.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::DEFAULT_PORT;
use crate::randomness::RandomnessSource;
use crate::table::TableGenerator;

use super::session::{Session, SessionPolicy};

// ============================================================================
// Constants
// ============================================================================

/// Default upper bound on concurrently served sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Pause after a failed accept, so descriptor exhaustion does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

// ============================================================================
// ServerConfig
// ============================================================================

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Sessions served at once; further connections wait in the backlog.
    pub max_sessions: usize,
    /// Per-session limits.
    pub session: SessionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_sessions: DEFAULT_MAX_SESSIONS,
            session: SessionPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Sets the listen address.
    #[inline]
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the session limit.
    #[inline]
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Sets the per-session policy.
    #[inline]
    #[must_use]
    pub fn with_session_policy(mut self, policy: SessionPolicy) -> Self {
        self.session = policy;
        self
    }

    /// Checks the settings for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if self.max_sessions == 0 {
            return Err(Error::config("max_sessions must be at least 1"));
        }
        if self.max_sessions > Semaphore::MAX_PERMITS {
            return Err(Error::config(format!(
                "max_sessions must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.session.max_invalid_requests == 0 {
            return Err(Error::config("max_invalid_requests must be at least 1"));
        }
        if self.session.idle_timeout.is_zero() || self.session.write_timeout.is_zero() {
            return Err(Error::config("session timeouts must be non-zero"));
        }
        if self.session.max_range_len == 0 {
            return Err(Error::config("max_range_len must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// TableServer
// ============================================================================

/// A bound table server.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use random_table::randomness::LocalRandomSource;
/// use random_table::transport::{ServerConfig, TableServer};
///
/// let server = TableServer::bind(ServerConfig::default(), Arc::new(LocalRandomSource::new())).await?;
/// server.run_until(tokio::signal::ctrl_c()).await?;
/// ```
pub struct TableServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    generator: TableGenerator,
    config: ServerConfig,
    sessions: Arc<Semaphore>,
}

impl TableServer {
    /// Validates `config` and binds the listener.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `config` is invalid
    /// - [`Error::Io`] if binding fails
    pub async fn bind(config: ServerConfig, source: Arc<dyn RandomnessSource>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        info!(
            addr = %local_addr,
            source = source.name(),
            max_sessions = config.max_sessions,
            "Table server listening"
        );

        Ok(Self {
            listener,
            local_addr,
            generator: TableGenerator::new(source),
            sessions: Arc::new(Semaphore::new(config.max_sessions)),
            config,
        })
    }

    /// Returns the bound address (useful when bound to port 0).
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the number of sessions currently open.
    #[inline]
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.config.max_sessions - self.sessions.available_permits()
    }

    /// Serves connections until the process ends.
    ///
    /// # Errors
    ///
    /// Only if the session limiter is closed, which does not happen while
    /// the server is alive.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Serves connections until `shutdown` completes.
    ///
    /// Open sessions are left to finish on their own; no new connection is
    /// accepted after `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Only if the session limiter is closed.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future + Send,
    {
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&self.sessions).acquire_owned() => permit
                    .map_err(|_| Error::connection("session limiter closed"))?,
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    drop(permit);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
            }

            let session = Session::new(stream, self.generator.clone(), self.config.session)
                .with_peer(peer);
            debug!(%peer, id = %session.id(), "Session accepted");

            tokio::spawn(async move {
                let summary = session.run().await;
                drop(permit);
                debug!(id = %summary.id, reason = ?summary.reason, "Session released");
            });
        }

        info!(addr = %self.local_addr, "Table server stopped accepting");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
