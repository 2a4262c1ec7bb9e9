//! In-process generators.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

use super::RandomnessSource;

// ============================================================================
// LocalRandomSource
// ============================================================================

/// Thread-local generator, reseeded from the OS.
///
/// Holds no state of its own, so concurrent sessions never share a stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalRandomSource;

impl LocalRandomSource {
    /// Creates the source.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RandomnessSource for LocalRandomSource {
    async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>> {
        shuffled_range(min, max, &mut rand::rng())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

// ============================================================================
// SeededRandomSource
// ============================================================================

/// Reproducible generator for debugging and tests.
///
/// Every call advances the shared generator, so consecutive permutations
/// differ; the whole sequence repeats only across restarts with the same
/// seed.
#[derive(Debug)]
pub struct SeededRandomSource {
    rng: Mutex<StdRng>,
}

impl SeededRandomSource {
    /// Creates a generator from `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl RandomnessSource for SeededRandomSource {
    async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>> {
        let mut rng = self.rng.lock();
        shuffled_range(min, max, &mut *rng)
    }

    fn name(&self) -> &'static str {
        "seeded"
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Fisher-Yates shuffle of `[min, max]`.
pub(crate) fn shuffled_range<R: Rng + ?Sized>(min: i64, max: i64, rng: &mut R) -> Result<Vec<i64>> {
    if min > max {
        return Err(Error::generation(format!("empty range {min}..={max}")));
    }

    let len = usize::try_from(i128::from(max) - i128::from(min) + 1)
        .map_err(|_| Error::generation("range does not fit in memory"))?;

    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|e| Error::generation(format!("cannot allocate {len} values: {e}")))?;
    values.extend(min..=max);
    values.shuffle(rng);

    Ok(values)
}

// ============================================================================
// Tests
// ============================================================================
