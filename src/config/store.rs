//! Configuration store implementations.
//!
//! File-backed stores read from disk on every [`ConfigStore::get`], so edits
//! (or a kubelet swapping a ConfigMap volume) show up on the next cycle.

// ============================================================================
// Imports
// ============================================================================

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};

use super::ConfigStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store.
///
/// `set` and `remove` exist for whoever plays the external system in tests
/// or embeddings; the client only reads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<FxHashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from key/value pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        for (key, value) in pairs {
            store.set(key, value);
        }
        store
    }

    /// Sets `key` to `value`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    /// Removes `key`.
    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<String> {
        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::config_unavailable(key, "key not found"))
    }
}

// ============================================================================
// DirectoryStore
// ============================================================================

/// One file per key, as a mounted ConfigMap volume lays them out.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Creates a store rooted at `root`.
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the store reads from.
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ConfigStore for DirectoryStore {
    async fn get(&self, key: &str) -> Result<String> {
        if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
            return Err(Error::config_unavailable(key, "invalid key"));
        }

        let path = self.root.join(key);
        trace!(path = %path.display(), "Reading config key");

        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(value.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::config_unavailable(key, "key not found"))
            }
            Err(e) => Err(Error::config_unavailable(key, e.to_string())),
        }
    }
}

// ============================================================================
// JsonFileStore
// ============================================================================

/// A JSON object file; values may be strings or numbers.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store reading `path`.
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<String> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::config_unavailable(key, format!("{}: {e}", self.path.display())))?;

        let document: Value = serde_json::from_str(&text)
            .map_err(|e| Error::config_unavailable(key, format!("{}: {e}", self.path.display())))?;

        match document.get(key) {
            Some(Value::String(value)) => Ok(value.trim().to_string()),
            Some(Value::Number(value)) => Ok(value.to_string()),
            Some(other) => Err(Error::config_unavailable(
                key,
                format!("unsupported value {other}"),
            )),
            None => Err(Error::config_unavailable(key, "key not found")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_and_get() {
        let store = MemoryStore::from_pairs([("min", "1")]);
        assert_eq!(store.get("min").await.expect("present"), "1");

        store.set("min", "2");
        assert_eq!(store.get("min").await.expect("present"), "2");

        store.remove("min");
        let err = store.get("min").await.expect_err("removed");
        assert!(matches!(err, Error::ConfigUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_directory_store_reads_fresh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirectoryStore::new(dir.path());

        std::fs::write(dir.path().join("max"), "10\n").expect("write");
        assert_eq!(store.get("max").await.expect("present"), "10");

        std::fs::write(dir.path().join("max"), "20\n").expect("rewrite");
        assert_eq!(store.get("max").await.expect("present"), "20");
    }

    #[tokio::test]
    async fn test_directory_store_missing_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirectoryStore::new(dir.path());

        let err = store.get("table-size").await.expect_err("missing");
        assert!(matches!(err, Error::ConfigUnavailable { ref key, .. } if key == "table-size"));
    }

    #[tokio::test]
    async fn test_directory_store_rejects_traversal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DirectoryStore::new(dir.path());

        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.get("..data").await.is_err());
    }

    #[tokio::test]
    async fn test_json_store_strings_and_numbers() -> anyhow::Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        std::fs::write(file.path(), r#"{"min": "5", "max": 50, "table-size": " 4 "}"#)?;
        let store = JsonFileStore::new(file.path());

        assert_eq!(store.get("min").await?, "5");
        assert_eq!(store.get("max").await?, "50");
        assert_eq!(store.get("table-size").await?, "4");
        Ok(())
    }

    #[tokio::test]
    async fn test_json_store_unreadable_document() -> anyhow::Result<()> {
        let file = tempfile::NamedTempFile::new()?;
        std::fs::write(file.path(), "{ not json")?;
        let store = JsonFileStore::new(file.path());

        let err = store.get("min").await.expect_err("bad json");
        assert!(matches!(err, Error::ConfigUnavailable { .. }));
        Ok(())
    }
}
