//! Table request type and request-line parser.
//!
//! # Format
//!
//! ```text
//! <min>,<max>,<cols>\n
//! ```
//!
//! Validation order:
//!
//! 1. exactly three comma-separated integers, else `non-numeric`
//! 2. `min < max`, else `empty-range`
//! 3. `cols >= 1`, else `invalid-columns`

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result, ValidationReason};

// ============================================================================
// TableRequest
// ============================================================================

/// A validated `{min, max, cols}` triple.
///
/// Construction always goes through validation, so a `TableRequest` in hand
/// satisfies `min < max` and `cols >= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TableRequest {
    min: i64,
    max: i64,
    cols: i64,
}

impl TableRequest {
    /// Validates and creates a request.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] with `empty-range` if `min >= max`
    /// - [`Error::Validation`] with `invalid-columns` if `cols < 1`
    pub fn new(min: i64, max: i64, cols: i64) -> Result<Self> {
        if min >= max {
            return Err(Error::validation(ValidationReason::EmptyRange));
        }
        if cols < 1 {
            return Err(Error::validation(ValidationReason::InvalidColumns));
        }
        Ok(Self { min, max, cols })
    }

    /// Parses a request line.
    ///
    /// Surrounding whitespace, including the line terminator, is ignored,
    /// as is whitespace around each token.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] naming the first rule the line breaks.
    pub fn parse(line: &str) -> Result<Self> {
        let mut tokens = line.trim().split(',');
        let (Some(min), Some(max), Some(cols), None) =
            (tokens.next(), tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(Error::validation(ValidationReason::NonNumeric));
        };

        Self::new(parse_int(min)?, parse_int(max)?, parse_int(cols)?)
    }

    /// Lower bound (inclusive).
    #[inline]
    #[must_use]
    pub const fn min(&self) -> i64 {
        self.min
    }

    /// Upper bound (inclusive).
    #[inline]
    #[must_use]
    pub const fn max(&self) -> i64 {
        self.max
    }

    /// Number of columns per row.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> i64 {
        self.cols
    }

    /// Number of integers in `[min, max]`, saturating at `u64::MAX`.
    #[must_use]
    pub fn range_len(&self) -> u64 {
        let len = i128::from(self.max) - i128::from(self.min) + 1;
        u64::try_from(len).unwrap_or(u64::MAX)
    }

    /// Number of rows the generated table will have.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        // cols >= 1 is an invariant of construction
        self.range_len().div_ceil(self.cols.unsigned_abs())
    }

    /// Rejects ranges larger than `max_range_len`.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] with `range-too-large`.
    pub fn check_range_limit(&self, max_range_len: u64) -> Result<()> {
        if self.range_len() > max_range_len {
            return Err(Error::validation(ValidationReason::RangeTooLarge));
        }
        Ok(())
    }

    /// Returns the newline-terminated wire form.
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for TableRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.min, self.max, self.cols)
    }
}

impl FromStr for TableRequest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_int(token: &str) -> Result<i64> {
    token
        .trim()
        .parse::<i64>()
        .map_err(|_| Error::validation(ValidationReason::NonNumeric))
}

// ============================================================================
// Tests
// ============================================================================
