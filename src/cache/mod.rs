//! Fallback cache for author listings
//!
//! The last successful live listing of every author is written to a
//! key-value store. When a live load produces nothing, the stored listing is
//! served instead, trading freshness for availability.
//!
//! Entries are keyed by author slug and hold a JSON array of
//! [`NormalizedArticle`]. Each save replaces the whole entry, so concurrent
//! saves for one author are last-write-wins. Entries never expire here; the
//! store's own retention decides eviction.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::config::{CacheBackend, CacheSection};
use crate::observability::metrics::metrics;
use crate::upstream::NormalizedArticle;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Key-value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Text key-value store holding serialized listings
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, `None` when absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value
    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// Build the store selected by configuration
pub fn store_from_config(config: &CacheSection) -> Arc<dyn KeyValueStore> {
    match config.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::File => Arc::new(FileStore::new(config.directory.clone())),
    }
}

/// Best-effort write-through cache over an injected store
#[derive(Clone)]
pub struct CacheFallback {
    store: Arc<dyn KeyValueStore>,
}

impl CacheFallback {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Replace the cached listing of `author`. Failures are logged only.
    pub async fn save(&self, author: &str, articles: &[NormalizedArticle]) {
        let payload = match serde_json::to_string(articles) {
            Ok(payload) => payload,
            Err(e) => {
                metrics().cache_write_failed();
                warn!(author, error = %e, "Failed to serialize articles for cache");
                return;
            }
        };

        match self.store.put(author, payload).await {
            Ok(()) => {
                metrics().cache_written();
                debug!(author, count = articles.len(), "Cached articles");
            }
            Err(e) => {
                metrics().cache_write_failed();
                warn!(author, error = %e, "Failed to write article cache");
            }
        }
    }

    /// Cached listing of `author`, if a usable one exists
    pub async fn load(&self, author: &str) -> Option<Vec<NormalizedArticle>> {
        let payload = match self.store.get(author).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                metrics().cache_missed();
                debug!(author, "No cached articles");
                return None;
            }
            Err(e) => {
                metrics().cache_missed();
                warn!(author, error = %e, "Failed to read article cache");
                return None;
            }
        };

        match serde_json::from_str::<Vec<NormalizedArticle>>(&payload) {
            Ok(articles) if !articles.is_empty() => {
                metrics().cache_hit();
                Some(articles)
            }
            Ok(_) => {
                metrics().cache_missed();
                None
            }
            Err(e) => {
                metrics().cache_missed();
                warn!(author, error = %e, "Ignoring malformed article cache entry");
                None
            }
        }
    }
}
