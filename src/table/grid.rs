//! Random table value type.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::protocol::TableRequest;

// ============================================================================
// RandomTable
// ============================================================================

/// Ordered rows of integers.
///
/// A table produced by [`TableGenerator`](super::TableGenerator) holds every
/// integer of the requested range exactly once; [`RandomTable::covers`]
/// checks that property for tables received from elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RandomTable {
    rows: Vec<Vec<i64>>,
}

impl RandomTable {
    /// Lays out `values` row-major, `cols` per row; the last row takes the
    /// remainder.
    #[must_use]
    pub fn from_permutation(values: &[i64], cols: usize) -> Self {
        let cols = cols.max(1);
        Self {
            rows: values.chunks(cols).map(<[i64]>::to_vec).collect(),
        }
    }

    /// Wraps already laid-out rows.
    #[inline]
    #[must_use]
    pub fn from_rows(rows: Vec<Vec<i64>>) -> Self {
        Self { rows }
    }

    /// Rows in order.
    #[inline]
    #[must_use]
    pub fn rows(&self) -> &[Vec<i64>] {
        &self.rows
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Total number of values across all rows.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// All values, row-major.
    pub fn values(&self) -> impl Iterator<Item = i64> + '_ {
        self.rows.iter().flatten().copied()
    }

    /// Consumes the table, returning its rows.
    #[inline]
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<i64>> {
        self.rows
    }

    /// Returns `true` if this table is a valid answer to `request`.
    ///
    /// Checks the shape (`cols` per row, short last row) and that the values
    /// are exactly `[min, max]`, each once.
    #[must_use]
    pub fn covers(&self, request: &TableRequest) -> bool {
        let Ok(cols) = usize::try_from(request.cols()) else {
            return false;
        };
        if self.row_count() as u64 != request.row_count() {
            return false;
        }

        let shape_ok = self.rows.split_last().is_some_and(|(last, body)| {
            body.iter().all(|row| row.len() == cols) && (1..=cols).contains(&last.len())
        });
        if !shape_ok {
            return false;
        }

        let mut seen = vec![false; self.value_count()];
        if seen.len() as u64 != request.range_len() {
            return false;
        }
        for value in self.values() {
            if value < request.min() || value > request.max() {
                return false;
            }
            let Ok(offset) = usize::try_from(i128::from(value) - i128::from(request.min())) else {
                return false;
            };
            if std::mem::replace(&mut seen[offset], true) {
                return false;
            }
        }

        true
    }
}

// ============================================================================
// Tests
// ============================================================================
