//! Primary-then-secondary wrapper.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;

use super::RandomnessSource;

// ============================================================================
// FallbackSource
// ============================================================================

/// Tries `primary`; on failure logs a warning and asks `secondary`.
#[derive(Debug, Clone)]
pub struct FallbackSource {
    primary: Arc<dyn RandomnessSource>,
    secondary: Arc<dyn RandomnessSource>,
}

impl FallbackSource {
    /// Creates the wrapper.
    #[inline]
    #[must_use]
    pub fn new(primary: Arc<dyn RandomnessSource>, secondary: Arc<dyn RandomnessSource>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl RandomnessSource for FallbackSource {
    async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>> {
        match self.primary.permutation(min, max).await {
            Ok(values) => Ok(values),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "Randomness source failed, falling back"
                );
                self.secondary.permutation(min, max).await
            }
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

// ============================================================================
// Tests
// ============================================================================
