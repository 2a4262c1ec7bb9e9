//! Table generation.
//!
//! Draws a fresh permutation of `[min, max]` from a [`RandomnessSource`] on
//! every call and chunks it into rows of `cols` values.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::{Error, Result};
use crate::protocol::TableRequest;
use crate::randomness::RandomnessSource;

use super::RandomTable;

// ============================================================================
// TableGenerator
// ============================================================================

/// Produces [`RandomTable`]s from a shared randomness source.
///
/// Cheap to clone; clones share the source.
#[derive(Clone)]
pub struct TableGenerator {
    source: Arc<dyn RandomnessSource>,
}

impl fmt::Debug for TableGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableGenerator")
            .field("source", &self.source.name())
            .finish()
    }
}

impl TableGenerator {
    /// Creates a generator over `source`.
    #[inline]
    #[must_use]
    pub fn new(source: Arc<dyn RandomnessSource>) -> Self {
        Self { source }
    }

    /// Name of the underlying source, for logs.
    #[inline]
    #[must_use]
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Generates a table for `request`.
    ///
    /// # Errors
    ///
    /// [`Error::Generation`] if the source fails or returns a sequence of the
    /// wrong length.
    pub async fn generate(&self, request: &TableRequest) -> Result<RandomTable> {
        let values = self
            .source
            .permutation(request.min(), request.max())
            .await?;

        if values.len() as u64 != request.range_len() {
            return Err(Error::generation(format!(
                "{} returned {} values for a range of {}",
                self.source.name(),
                values.len(),
                request.range_len()
            )));
        }

        let cols = usize::try_from(request.cols()).unwrap_or(usize::MAX);
        let table = RandomTable::from_permutation(&values, cols);

        trace!(%request, rows = table.row_count(), "Table generated");

        Ok(table)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use proptest::prelude::*;

    use crate::randomness::{LocalRandomSource, SeededRandomSource};

    /// Returns the range in ascending order.
    #[derive(Debug)]
    struct IdentitySource;

    #[async_trait]
    impl RandomnessSource for IdentitySource {
        async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>> {
            Ok((min..=max).collect())
        }

        fn name(&self) -> &'static str {
            "identity"
        }
    }

    /// Drops the last value.
    #[derive(Debug)]
    struct ShortSource;

    #[async_trait]
    impl RandomnessSource for ShortSource {
        async fn permutation(&self, min: i64, max: i64) -> Result<Vec<i64>> {
            Ok((min..max).collect())
        }

        fn name(&self) -> &'static str {
            "short"
        }
    }

    fn local() -> TableGenerator {
        TableGenerator::new(Arc::new(LocalRandomSource::new()))
    }

    #[tokio::test]
    async fn test_layout_is_deterministic_for_fixed_permutation() {
        let generator = TableGenerator::new(Arc::new(IdentitySource));
        let request = TableRequest::new(1, 7, 3).expect("valid");

        let table = generator.generate(&request).await.expect("generate");
        assert_eq!(table.rows(), &[vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[tokio::test]
    async fn test_one_to_ten_in_five_columns() {
        let request = TableRequest::parse("1,10,5").expect("valid");
        let table = local().generate(&request).await.expect("generate");

        assert_eq!(table.row_count(), 2);
        assert!(table.rows().iter().all(|row| row.len() == 5));

        let mut values: Vec<i64> = table.values().collect();
        values.sort_unstable();
        assert_eq!(values, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_ten_to_thirty_six_in_six_columns() {
        let request = TableRequest::parse("10,36,6").expect("valid");
        let table = local().generate(&request).await.expect("generate");

        let lens: Vec<usize> = table.rows().iter().map(Vec::len).collect();
        assert_eq!(lens, vec![6, 6, 6, 6, 3]);
        assert!(table.covers(&request));
    }

    #[tokio::test]
    async fn test_more_columns_than_values() {
        let request = TableRequest::new(1, 3, 100).expect("valid");
        let table = local().generate(&request).await.expect("generate");
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.value_count(), 3);
    }

    #[tokio::test]
    async fn test_wrong_length_is_generation_error() {
        let generator = TableGenerator::new(Arc::new(ShortSource));
        let request = TableRequest::new(1, 10, 5).expect("valid");

        let err = generator.generate(&request).await.expect_err("short");
        assert!(matches!(err, Error::Generation { .. }));
    }

    #[tokio::test]
    async fn test_each_call_draws_a_fresh_permutation() {
        let generator = TableGenerator::new(Arc::new(SeededRandomSource::new(7)));
        let request = TableRequest::new(1, 50, 10).expect("valid");

        let first = generator.generate(&request).await.expect("first");
        let second = generator.generate(&request).await.expect("second");
        assert_ne!(first, second);
    }

    proptest! {
        #[test]
        fn prop_table_is_exact_cover(
            min in -1_000i64..1_000,
            span in 1i64..400,
            cols in 1i64..50,
            seed in any::<u64>(),
        ) {
            let request = TableRequest::new(min, min + span, cols).expect("valid");
            let generator = TableGenerator::new(Arc::new(SeededRandomSource::new(seed)));

            let table = tokio_test::block_on(generator.generate(&request)).expect("generate");

            prop_assert!(table.covers(&request));
            prop_assert_eq!(table.value_count() as u64, request.range_len());
            prop_assert_eq!(table.row_count() as u64, request.row_count());

            let last = table.rows().last().expect("at least one row");
            prop_assert!(!last.is_empty() && last.len() as i64 <= cols);
        }
    }
}
