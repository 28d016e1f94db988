//! # Cache Observers
//!
//! Derived-state consumers (grouped indices, counters, audit hooks) subscribe
//! to a [`CacheStore`](super::CacheStore) through this trait. Notifications are
//! delivered synchronously, in registration order, after the store mutation
//! has been applied and every store lock has been released.

/// Result type returned by observer callbacks
pub type ObserverResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Receives mutation events from a cache store
///
/// A failing or panicking callback is logged by the store and does not affect
/// the mutation that triggered it or the observers registered after it.
pub trait CacheObserver<K, V>: Send + Sync {
    /// The whole mapping was replaced with `items`
    fn on_refreshed(&self, items: &[(K, V)]) -> ObserverResult;

    /// `key` was inserted or overwritten with `item`
    fn on_item_updated(&self, key: &K, item: &V) -> ObserverResult;

    /// `key` was removed
    fn on_item_deleted(&self, key: &K) -> ObserverResult;

    /// Get observer name for identification in logs
    fn observer_name(&self) -> &str {
        "unnamed_observer"
    }
}
