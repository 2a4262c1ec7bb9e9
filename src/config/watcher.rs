//! Fresh-on-every-call parameter fetcher.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};

use super::{ClientConfig, ConfigStore, KEY_MAX, KEY_MIN, KEY_TABLE_SIZE};

// ============================================================================
// Constants
// ============================================================================

/// Default per-key fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// ConfigWatcher
// ============================================================================

/// Reads [`ClientConfig`] from a store on every [`fetch`](Self::fetch).
#[derive(Clone)]
pub struct ConfigWatcher {
    store: Arc<dyn ConfigStore>,
    timeout: Duration,
}

impl fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("store", &self.store)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ConfigWatcher {
    /// Creates a watcher with [`DEFAULT_FETCH_TIMEOUT`].
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Sets the per-key fetch timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.timeout = fetch_timeout;
        self
    }

    /// Reads the current configuration.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigUnavailable`] if a key is missing, not an integer, or
    /// the store does not answer within the timeout.
    pub async fn fetch(&self) -> Result<ClientConfig> {
        let config = ClientConfig {
            min: self.read_int(KEY_MIN).await?,
            max: self.read_int(KEY_MAX).await?,
            table_size: self.read_int(KEY_TABLE_SIZE).await?,
        };

        debug!(
            min = config.min,
            max = config.max,
            table_size = config.table_size,
            "Configuration fetched"
        );

        Ok(config)
    }

    async fn read_int(&self, key: &str) -> Result<i64> {
        let raw = timeout(self.timeout, self.store.get(key))
            .await
            .map_err(|_| {
                Error::config_unavailable(
                    key,
                    format!("store did not answer within {}ms", self.timeout.as_millis()),
                )
            })??;

        raw.trim()
            .parse()
            .map_err(|_| Error::config_unavailable(key, format!("not an integer: {raw:?}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::config::MemoryStore;

    #[derive(Debug)]
    struct HangingStore;

    #[async_trait]
    impl ConfigStore for HangingStore {
        async fn get(&self, _key: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("1".into())
        }
    }

    fn store(min: &str, max: &str, size: &str) -> Arc<MemoryStore> {
        Arc::new(MemoryStore::from_pairs([
            (KEY_MIN, min),
            (KEY_MAX, max),
            (KEY_TABLE_SIZE, size),
        ]))
    }

    #[tokio::test]
    async fn test_fetch_reads_all_keys() {
        let watcher = ConfigWatcher::new(store("1", "10", "5"));
        let config = watcher.fetch().await.expect("fetch");
        assert_eq!(
            config,
            ClientConfig {
                min: 1,
                max: 10,
                table_size: 5
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_sees_every_change() {
        let store = store("1", "10", "5");
        let watcher = ConfigWatcher::new(store.clone());

        assert_eq!(watcher.fetch().await.expect("first").max, 10);

        store.set(KEY_MAX, "36");
        store.set(KEY_TABLE_SIZE, "6");
        let config = watcher.fetch().await.expect("second");
        assert_eq!((config.max, config.table_size), (36, 6));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = store("1", "10", "5");
        store.remove(KEY_TABLE_SIZE);

        let err = ConfigWatcher::new(store).fetch().await.expect_err("missing");
        assert!(matches!(err, Error::ConfigUnavailable { ref key, .. } if key == KEY_TABLE_SIZE));
    }

    #[tokio::test]
    async fn test_non_integer_value() {
        let err = ConfigWatcher::new(store("one", "10", "5"))
            .fetch()
            .await
            .expect_err("not an integer");
        assert!(matches!(err, Error::ConfigUnavailable { ref key, .. } if key == KEY_MIN));
    }

    #[tokio::test]
    async fn test_hanging_store_times_out() {
        let watcher = ConfigWatcher::new(Arc::new(HangingStore)).with_timeout(Duration::from_millis(50));

        let err = watcher.fetch().await.expect_err("timeout");
        assert!(matches!(err, Error::ConfigUnavailable { .. }));
        assert!(err.to_string().contains("did not answer"));
    }
}
