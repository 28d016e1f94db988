//! # Cache Store
//!
//! The primary key→item mapping of one cache plus its "initialized" flag.
//!
//! ## Concurrency
//!
//! Items live in a [`DashMap`], so reads and per-key writes proceed without a
//! global lock. The map itself sits behind an `Arc` that [`CacheStore::replace`]
//! swaps in a single step: readers observe either the old or the new mapping,
//! never a mix. Single-key writers hold the shared side of the swap lock while
//! touching the map, which keeps a write from landing in a mapping that is
//! being discarded. No store lock is held while observers run.
//!
//! Bulk loads and refresh cycles additionally serialize on an async write
//! lock ([`CacheStore::lock_writes`]), so a replace never interleaves with a
//! batch of delta writes for the same cache.

use crate::error::{CacheError, CacheResult};
use crate::store::observer::{CacheObserver, ObserverResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt::Debug;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Thread-safe keyed item store with synchronous mutation events
pub struct CacheStore<K, V> {
    /// Caller-supplied name used in logs and errors
    label: String,
    map: RwLock<Arc<DashMap<K, V>>>,
    initialized: AtomicBool,
    observers: RwLock<Vec<Arc<dyn CacheObserver<K, V>>>>,
    stats: StoreCounters,
    /// Held by loaders and refreshers for a whole load or cycle
    writes: tokio::sync::Mutex<()>,
}

#[derive(Debug, Default)]
struct StoreCounters {
    replaces: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    observer_failures: AtomicU64,
}

/// Point-in-time store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub label: String,
    pub initialized: bool,
    pub item_count: usize,
    pub observer_count: usize,
    pub replaces: u64,
    pub updates: u64,
    pub deletes: u64,
    pub observer_failures: u64,
}

impl<K, V> CacheStore<K, V> {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Acquire the store's write lock.
    ///
    /// [`CacheLoader`](crate::loader::CacheLoader) holds it across fetch and
    /// replace, [`PollingRefresher`](crate::refresh::PollingRefresher) across
    /// fetch and apply. Plain `set`/`delete` calls do not take it.
    pub async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.writes.lock().await
    }
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty, uninitialized store
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            map: RwLock::new(Arc::new(DashMap::new())),
            initialized: AtomicBool::new(false),
            observers: RwLock::new(Vec::new()),
            stats: StoreCounters::default(),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Whether a full replace has ever completed
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Register an observer. Must happen during composition, before any
    /// refresh or mutation traffic starts.
    pub fn register_observer(&self, observer: Arc<dyn CacheObserver<K, V>>) {
        info!(
            cache = %self.label,
            observer = observer.observer_name(),
            "Registered cache observer"
        );
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    /// Swap the entire mapping for `items` and mark the store initialized.
    ///
    /// Duplicate keys in `items` resolve to the last occurrence. Observers
    /// receive the resulting item set once the swap is visible.
    pub fn replace<I>(&self, items: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let next: DashMap<K, V> = items.into_iter().collect();
        let snapshot: Vec<(K, V)> = next
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        *self.map.write() = Arc::new(next);
        self.initialized.store(true, Ordering::Release);
        self.stats.replaces.fetch_add(1, Ordering::Relaxed);

        debug!(
            cache = %self.label,
            item_count = snapshot.len(),
            "Cache contents replaced"
        );

        self.notify("refreshed", |observer| observer.on_refreshed(&snapshot));
    }

    /// Look up a single item
    pub fn get(&self, key: &K) -> CacheResult<Option<V>> {
        self.ensure_initialized()?;
        let map = self.map.read();
        Ok(map.get(key).map(|entry| entry.value().clone()))
    }

    /// Look up a single item, falling back to `V::default()` when absent
    pub fn get_or_default(&self, key: &K) -> CacheResult<V>
    where
        V: Default,
    {
        Ok(self.get(key)?.unwrap_or_default())
    }

    /// Snapshot of every entry. Concurrent writes after the call are not reflected.
    pub fn get_all(&self) -> CacheResult<Vec<(K, V)>> {
        self.ensure_initialized()?;
        let map = self.map.read();
        Ok(map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    pub fn contains_key(&self, key: &K) -> CacheResult<bool> {
        self.ensure_initialized()?;
        Ok(self.map.read().contains_key(key))
    }

    /// Number of cached items (zero before initialization)
    pub fn count(&self) -> usize {
        self.map.read().len()
    }

    /// Insert or overwrite `key`, returning the previous item.
    ///
    /// Last writer wins; the update event is always emitted.
    pub fn set(&self, key: K, item: V) -> Option<V> {
        let previous = {
            let map = self.map.read();
            map.insert(key.clone(), item.clone())
        };
        self.stats.updates.fetch_add(1, Ordering::Relaxed);

        self.notify("item_updated", |observer| {
            observer.on_item_updated(&key, &item)
        });
        previous
    }

    /// Write `item` only if the current value of `key` equals `expected`
    /// (`None` meaning "absent").
    ///
    /// Fails with [`CacheError::OperationLostRace`] without writing or
    /// emitting an event when another writer got there first.
    pub fn compare_and_set(&self, key: K, expected: Option<&V>, item: V) -> CacheResult<Option<V>>
    where
        V: PartialEq,
    {
        let outcome = {
            let map = self.map.read();
            let written = match map.entry(key.clone()) {
                Entry::Occupied(mut occupied) => {
                    if expected == Some(occupied.get()) {
                        Some(Some(occupied.insert(item.clone())))
                    } else {
                        None
                    }
                }
                Entry::Vacant(vacant) => {
                    if expected.is_none() {
                        vacant.insert(item.clone());
                        Some(None)
                    } else {
                        None
                    }
                }
            };
            written
        };

        let previous = outcome
            .ok_or_else(|| CacheError::operation_lost_race(&self.label, &key, "compare_and_set"))?;
        self.stats.updates.fetch_add(1, Ordering::Relaxed);

        self.notify("item_updated", |observer| {
            observer.on_item_updated(&key, &item)
        });
        Ok(previous)
    }

    /// Remove `key`, returning the removed item.
    ///
    /// The delete event is emitted only when an entry was actually removed.
    pub fn delete(&self, key: &K) -> Option<V> {
        let removed = {
            let map = self.map.read();
            map.remove(key).map(|(_, item)| item)
        };

        if removed.is_some() {
            self.stats.deletes.fetch_add(1, Ordering::Relaxed);
            self.notify("item_deleted", |observer| observer.on_item_deleted(key));
        }
        removed
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            label: self.label.clone(),
            initialized: self.is_initialized(),
            item_count: self.count(),
            observer_count: self.observer_count(),
            replaces: self.stats.replaces.load(Ordering::Relaxed),
            updates: self.stats.updates.load(Ordering::Relaxed),
            deletes: self.stats.deletes.load(Ordering::Relaxed),
            observer_failures: self.stats.observer_failures.load(Ordering::Relaxed),
        }
    }

    fn ensure_initialized(&self) -> CacheResult<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(CacheError::not_initialized(&self.label))
        }
    }

    fn notify<F>(&self, event: &'static str, deliver: F)
    where
        F: Fn(&dyn CacheObserver<K, V>) -> ObserverResult,
    {
        let observers = self.observers.read().clone();

        for observer in &observers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| deliver(observer.as_ref())));
            let failure = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("observer panicked: {}", panic_message(&payload)),
            };

            self.stats.observer_failures.fetch_add(1, Ordering::Relaxed);
            error!(
                cache = %self.label,
                observer = observer.observer_name(),
                event = event,
                error = %failure,
                "Cache observer failed; mutation kept"
            );
        }
    }
}

impl<K, V> std::fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("label", &self.label)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
