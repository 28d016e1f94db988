//! # Refresh Handlers
//!
//! Turn a delta into a store mutation. [`HandlerDispatch`] maps each
//! [`ChangeKind`] to the handler that applies it; a kind with no handler means
//! the refresher was composed incorrectly. A dispatch is bound to the store its
//! handlers write to, and the refresher takes that store's write lock for
//! every cycle.

use crate::error::{CacheError, CacheResult};
use crate::source::ChangeKind;
use crate::store::CacheStore;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

/// Applies deltas of one change kind to a store
pub trait RefreshHandler<K, V>: Send + Sync {
    fn kind(&self) -> ChangeKind;

    /// Apply one delta. `Ok(false)` means the store did not take the change
    /// (logged as a warning, the batch carries on).
    fn handle(&self, key: K, item: Option<V>) -> CacheResult<bool>;
}

/// Upserts the delta's item
pub struct UpdatedHandler<K, V> {
    store: Arc<CacheStore<K, V>>,
}

impl<K, V> UpdatedHandler<K, V> {
    pub fn new(store: Arc<CacheStore<K, V>>) -> Self {
        Self { store }
    }
}

impl<K, V> RefreshHandler<K, V> for UpdatedHandler<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn kind(&self) -> ChangeKind {
        ChangeKind::Updated
    }

    fn handle(&self, key: K, item: Option<V>) -> CacheResult<bool> {
        let Some(item) = item else {
            return Err(CacheError::invalid_delta(
                self.store.label(),
                &key,
                "Updated delta carries no item",
            ));
        };

        let previous = self.store.set(key.clone(), item);
        debug!(
            cache = %self.store.label(),
            key = ?key,
            replaced = previous.is_some(),
            "Applied Updated delta"
        );
        Ok(true)
    }
}

/// Removes the delta's key
pub struct DeletedHandler<K, V> {
    store: Arc<CacheStore<K, V>>,
}

impl<K, V> DeletedHandler<K, V> {
    pub fn new(store: Arc<CacheStore<K, V>>) -> Self {
        Self { store }
    }
}

impl<K, V> RefreshHandler<K, V> for DeletedHandler<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn kind(&self) -> ChangeKind {
        ChangeKind::Deleted
    }

    fn handle(&self, key: K, _item: Option<V>) -> CacheResult<bool> {
        if self.store.delete(&key).is_some() {
            debug!(cache = %self.store.label(), key = ?key, "Applied Deleted delta");
            return Ok(true);
        }

        warn!(
            cache = %self.store.label(),
            key = ?key,
            "Item was already gone or changed concurrently, delete had no effect"
        );
        Ok(false)
    }
}

/// Change-kind → handler table for one store
pub struct HandlerDispatch<K, V> {
    store: Arc<CacheStore<K, V>>,
    handlers: HashMap<ChangeKind, Arc<dyn RefreshHandler<K, V>>>,
}

impl<K, V> HandlerDispatch<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Empty dispatch for `store`; handlers are added with [`register`](Self::register)
    pub fn new(store: Arc<CacheStore<K, V>>) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Dispatch with the built-in Updated and Deleted handlers bound to `store`
    pub fn for_store(store: Arc<CacheStore<K, V>>) -> Self {
        let mut dispatch = Self::new(store.clone());
        dispatch.register(Arc::new(UpdatedHandler::new(store.clone())));
        dispatch.register(Arc::new(DeletedHandler::new(store)));
        dispatch
    }

    /// Register a handler, replacing any previous one for the same kind
    pub fn register(&mut self, handler: Arc<dyn RefreshHandler<K, V>>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn create(&self, kind: ChangeKind) -> CacheResult<Arc<dyn RefreshHandler<K, V>>> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| CacheError::no_handler_for_kind(kind))
    }

    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.handlers.keys().copied().collect()
    }

    /// Store whose write lock guards each refresh cycle
    pub fn store(&self) -> &Arc<CacheStore<K, V>> {
        &self.store
    }
}

impl<K, V> std::fmt::Debug for HandlerDispatch<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDispatch")
            .field("cache", &self.store.label())
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
