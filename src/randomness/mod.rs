//! Randomness sources.
//!
//! A [`RandomnessSource`] returns every integer of `[min, max]` exactly once
//! in uniformly random order. Sources are shared by all server sessions, so
//! each one is `Send + Sync` and never replays a permutation.
//!
//! # Sources
//!
//! | Type | Backing | Failure mode |
//! |------|---------|--------------|
//! | [`LocalRandomSource`] | thread-local OS-seeded RNG | allocation only |
//! | [`SeededRandomSource`] | `StdRng` from a fixed seed, behind a mutex | allocation only |
//! | [`RemoteEntropySource`] | HTTP sequence generator | timeout, HTTP or body errors |
//! | [`FallbackSource`] | primary, then secondary | secondary's failure |
//!
//! What happens when the remote service fails is chosen by the deployment
//! through [`EntropyPolicy`], never implicitly.

// ============================================================================
// Submodules
// ============================================================================

/// Primary-then-secondary wrapper.
pub mod fallback;

/// In-process generators.
pub mod local;

/// Remote HTTP entropy service.
pub mod remote;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Re-exports
// ============================================================================

pub use fallback::FallbackSource;
pub use local::{LocalRandomSource, SeededRandomSource};
pub use remote::RemoteEntropySource;

// ============================================================================
// RandomnessSource
// ============================================================================

/// Supplies duplicate-free random permutations of integer ranges.
#[async_trait]
pub trait RandomnessSource: Send + Sync + fmt::Debug {
    /// Returns `[min, max]` in random order, each value once.
    ///
    /// # Errors
    ///
    /// [`Error::Generation`](crate::Error::Generation) if no permutation
    /// could be produced.
    async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

// ============================================================================
// EntropyPolicy
// ============================================================================

/// What to do when the remote entropy service fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntropyPolicy {
    /// Fail the request with a generation error.
    #[default]
    Strict,
    /// Serve the request from the local generator instead.
    FallbackToLocal,
}

impl EntropyPolicy {
    /// Wraps `remote` according to this policy.
    #[must_use]
    pub fn apply(self, remote: RemoteEntropySource) -> Arc<dyn RandomnessSource> {
        match self {
            Self::Strict => Arc::new(remote),
            Self::FallbackToLocal => Arc::new(FallbackSource::new(
                Arc::new(remote),
                Arc::new(LocalRandomSource::new()),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_policy_default_is_strict() {
        assert_eq!(EntropyPolicy::default(), EntropyPolicy::Strict);
    }

    #[test]
    fn test_policy_apply_names() {
        let remote = RemoteEntropySource::new("http://127.0.0.1:9/", Duration::from_millis(10))
            .expect("valid url");
        assert_eq!(EntropyPolicy::Strict.apply(remote.clone()).name(), "remote");
        assert_eq!(EntropyPolicy::FallbackToLocal.apply(remote).name(), "fallback");
    }
}
