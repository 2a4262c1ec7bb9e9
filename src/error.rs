//! Error types for the random table service.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use random_table::{Result, TableRequest};
//!
//! fn example(line: &str) -> Result<TableRequest> {
//!     let request = TableRequest::parse(line)?;
//!     Ok(request)
//! }
//! ```
//!
//! # Error Categories
//!
//! | Kind | Variants |
//! |------|----------|
//! | [`ErrorKind::Validation`] | [`Error::Validation`], [`Error::Rejected`] |
//! | [`ErrorKind::Network`] | [`Error::Connection`], [`Error::Timeout`], [`Error::ConnectionClosed`], [`Error::Protocol`], [`Error::Io`] |
//! | [`ErrorKind::ConfigUnavailable`] | [`Error::ConfigUnavailable`] |
//! | [`ErrorKind::Generation`] | [`Error::Generation`] |
//! | [`ErrorKind::Internal`] | [`Error::Config`], [`Error::Json`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// ValidationReason
// ============================================================================

/// Why a request line was rejected.
///
/// The string form is what travels on the wire after `ERROR: `.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationReason {
    /// Not exactly three comma-separated integers.
    NonNumeric,
    /// `min >= max`.
    EmptyRange,
    /// `cols < 1`.
    InvalidColumns,
    /// The range holds more values than the server is willing to shuffle.
    RangeTooLarge,
}

impl ValidationReason {
    /// Returns the wire form of the reason.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NonNumeric => "non-numeric",
            Self::EmptyRange => "empty-range",
            Self::InvalidColumns => "invalid-columns",
            Self::RangeTooLarge => "range-too-large",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ErrorKind
// ============================================================================

/// Coarse error taxonomy used for reporting and recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range request.
    Validation,
    /// Connection refused, reset, timed out or garbled.
    Network,
    /// Configuration store unreachable, key missing or value unusable.
    ConfigUnavailable,
    /// Randomness source failed.
    Generation,
    /// Invalid process options or serialization failure.
    Internal,
}

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// Request failed local validation.
    #[error("Invalid request: {reason}")]
    Validation {
        /// Which rule was violated.
        reason: ValidationReason,
    },

    /// Server answered with an `ERROR:` line.
    #[error("Request rejected: {reason}")]
    Rejected {
        /// Reason text sent by the server.
        reason: String,
    },

    // ========================================================================
    // Network Errors
    // ========================================================================
    /// Connection could not be established or was reset.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Operation timeout.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Peer closed the connection before the message was complete.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Message did not follow the line protocol.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration store could not supply a usable value.
    #[error("Configuration unavailable ({key}): {message}")]
    ConfigUnavailable {
        /// Key being read.
        key: String,
        /// What went wrong.
        message: String,
    },

    /// Invalid process or library options.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Generation Errors
    // ========================================================================
    /// Randomness source failed.
    #[error("Generation failed: {message}")]
    Generation {
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a validation error.
    #[inline]
    pub fn validation(reason: ValidationReason) -> Self {
        Self::Validation { reason }
    }

    /// Creates a rejected error from a server `ERROR:` line.
    #[inline]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a configuration-unavailable error.
    #[inline]
    pub fn config_unavailable(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigUnavailable {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a generation error.
    #[inline]
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Rejected { .. } => ErrorKind::Validation,
            Self::Connection { .. }
            | Self::Timeout { .. }
            | Self::ConnectionClosed
            | Self::Protocol { .. }
            | Self::Io(_) => ErrorKind::Network,
            Self::ConfigUnavailable { .. } => ErrorKind::ConfigUnavailable,
            Self::Generation { .. } => ErrorKind::Generation,
            Self::Config { .. } | Self::Json(_) | Self::Url(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if the request itself was at fault.
    #[inline]
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Returns `true` if this is a network error.
    #[inline]
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        self.kind() == ErrorKind::Network
    }

    /// Returns the validation reason, if this is a local validation error.
    #[inline]
    #[must_use]
    pub fn validation_reason(&self) -> Option<ValidationReason> {
        match self {
            Self::Validation { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Operator-facing one-line description.
    ///
    /// Keeps client-side mistakes apart from infrastructure problems.
    #[must_use]
    pub fn report(&self) -> String {
        match self {
            Self::Validation { reason } => format!("request rejected: {reason}"),
            Self::Rejected { reason } => format!("request rejected: {reason}"),
            Self::ConfigUnavailable { key, message } => {
                format!("configuration unavailable: {key}: {message}")
            }
            Self::Generation { message } => format!("generation failed: {message}"),
            err if err.is_network_error() => format!("server unreachable: {err}"),
            err => format!("internal error: {err}"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind as IoErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
    }

    #[test]
    fn test_reason_wire_form() {
        assert_eq!(ValidationReason::NonNumeric.as_str(), "non-numeric");
        assert_eq!(ValidationReason::EmptyRange.as_str(), "empty-range");
        assert_eq!(ValidationReason::InvalidColumns.as_str(), "invalid-columns");
        assert_eq!(ValidationReason::RangeTooLarge.to_string(), "range-too-large");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            Error::validation(ValidationReason::EmptyRange).kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::rejected("empty-range").kind(), ErrorKind::Validation);
        assert_eq!(Error::ConnectionClosed.kind(), ErrorKind::Network);
        assert_eq!(Error::timeout("read", 5).kind(), ErrorKind::Network);
        assert_eq!(
            Error::config_unavailable("min", "missing").kind(),
            ErrorKind::ConfigUnavailable
        );
        assert_eq!(Error::generation("boom").kind(), ErrorKind::Generation);
        assert_eq!(Error::config("bad").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_io_error_is_network() {
        let io_err = IoError::new(IoErrorKind::ConnectionReset, "reset");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_network_error());
    }

    #[test]
    fn test_report_distinguishes_causes() {
        assert_eq!(
            Error::rejected("empty-range").report(),
            "request rejected: empty-range"
        );
        assert_eq!(
            Error::validation(ValidationReason::NonNumeric).report(),
            "request rejected: non-numeric"
        );
        assert!(Error::ConnectionClosed.report().starts_with("server unreachable"));
        assert!(
            Error::config_unavailable("max", "timed out")
                .report()
                .starts_with("configuration unavailable: max")
        );
    }

    #[test]
    fn test_validation_reason_accessor() {
        let err = Error::validation(ValidationReason::InvalidColumns);
        assert_eq!(err.validation_reason(), Some(ValidationReason::InvalidColumns));
        assert_eq!(Error::ConnectionClosed.validation_reason(), None);
    }
}
