//! Runtime parameters from an external key-value store.
//!
//! The store is the system of record for the client's `min`, `max` and
//! `table-size`. It may change at any time; [`ConfigWatcher`] re-reads it on
//! every cycle and never caches.
//!
//! # Stores
//!
//! | Type | Backing |
//! |------|---------|
//! | [`MemoryStore`] | in-process map |
//! | [`DirectoryStore`] | one file per key (ConfigMap volume layout) |
//! | [`JsonFileStore`] | one JSON object file |

// ============================================================================
// Submodules
// ============================================================================

/// Store implementations.
pub mod store;

/// Fresh-on-every-call parameter fetcher.
pub mod watcher;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::TableRequest;

// ============================================================================
// Re-exports
// ============================================================================

pub use store::{DirectoryStore, JsonFileStore, MemoryStore};
pub use watcher::{ConfigWatcher, DEFAULT_FETCH_TIMEOUT};

// ============================================================================
// Keys
// ============================================================================

/// Store key holding the lower bound.
pub const KEY_MIN: &str = "min";

/// Store key holding the upper bound.
pub const KEY_MAX: &str = "max";

/// Store key holding the column count.
pub const KEY_TABLE_SIZE: &str = "table-size";

// ============================================================================
// ConfigStore
// ============================================================================

/// Read-only view of an external key-value store.
#[async_trait]
pub trait ConfigStore: Send + Sync + fmt::Debug {
    /// Returns the current value of `key`.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigUnavailable`](crate::Error::ConfigUnavailable) if the
    /// store cannot be read or the key is absent.
    async fn get(&self, key: &str) -> Result<String>;
}

// ============================================================================
// ClientConfig
// ============================================================================

/// Parameters as stored; `table_size` becomes the request's `cols`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Lower bound.
    pub min: i64,
    /// Upper bound.
    pub max: i64,
    /// Columns per row.
    #[serde(rename = "table-size")]
    pub table_size: i64,
}

impl ClientConfig {
    /// Validates the configuration as a request.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`](crate::Error::Validation) if the stored values
    /// do not form a valid request.
    pub fn to_request(&self) -> Result<TableRequest> {
        TableRequest::new(self.min, self.max, self.table_size)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::ValidationReason;

    #[test]
    fn test_to_request_maps_table_size_to_cols() {
        let config = ClientConfig {
            min: 10,
            max: 36,
            table_size: 6,
        };
        let request = config.to_request().expect("valid");
        assert_eq!(request.cols(), 6);
    }

    #[test]
    fn test_to_request_validates() {
        let config = ClientConfig {
            min: 10,
            max: 5,
            table_size: 6,
        };
        let err = config.to_request().expect_err("inverted");
        assert_eq!(err.validation_reason(), Some(ValidationReason::EmptyRange));
    }

    #[test]
    fn test_serde_uses_store_key_names() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"min": 1, "max": 10, "table-size": 5}"#).expect("parse");
        assert_eq!(config.table_size, 5);
    }
}
