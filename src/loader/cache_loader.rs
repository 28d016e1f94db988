//! # Cache Loader
//!
//! One-time bootstrap of a [`CacheStore`] from a full-snapshot [`DataSource`].
//! The load holds the store's write lock from fetch to replace, so concurrent
//! loads of one cache serialize and never interleave with a refresh cycle.

use crate::error::{CacheError, CacheResult};
use crate::logging::{log_cache_operation, log_error};
use crate::source::DataSource;
use crate::store::CacheStore;
use async_trait::async_trait;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Object-safe view of a loader, used by the startup orchestrator
#[async_trait]
pub trait Load: Send + Sync {
    /// Cache label for logs and failure reports
    fn label(&self) -> &str;

    /// Run the load; `false` means the cache was not populated
    async fn load(&self, cancel: &CancellationToken) -> bool;
}

/// Loads a full snapshot into a store
pub struct CacheLoader<K, V> {
    store: Arc<CacheStore<K, V>>,
    source: Arc<dyn DataSource<K, V>>,
}

impl<K, V> CacheLoader<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<CacheStore<K, V>>, source: Arc<dyn DataSource<K, V>>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<CacheStore<K, V>> {
        &self.store
    }

    /// Fetch the snapshot and replace the store; returns the number of items
    /// loaded.
    pub async fn try_load(&self, cancel: &CancellationToken) -> CacheResult<usize> {
        let operation = format!("{}.load", self.store.label());

        let _writes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CacheError::cancelled(operation)),
            guard = self.store.lock_writes() => guard,
        };

        debug!(
            cache = %self.store.label(),
            source = self.source.source_name(),
            "Loading full snapshot"
        );

        let started = Instant::now();
        let items = self.source.load_all(cancel).await?;
        let item_count = items.len();
        self.store.replace(items);

        info!(
            cache = %self.store.label(),
            item_count,
            duration_ms = started.elapsed().as_millis() as u64,
            "✅ Cache loaded"
        );
        Ok(item_count)
    }
}

#[async_trait]
impl<K, V> Load for CacheLoader<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn label(&self) -> &str {
        self.store.label()
    }

    async fn load(&self, cancel: &CancellationToken) -> bool {
        match self.try_load(cancel).await {
            Ok(item_count) => {
                log_cache_operation("load", self.label(), "success", Some(item_count), None);
                true
            }
            Err(error) => {
                log_error(
                    "cache_loader",
                    "load",
                    &error.to_string(),
                    Some(self.label()),
                );
                false
            }
        }
    }
}

impl<K, V> std::fmt::Debug for CacheLoader<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLoader")
            .field("cache", &self.store.label())
            .field("source", &self.source.source_name())
            .finish()
    }
}
