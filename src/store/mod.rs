//! # Primary Store
//!
//! [`CacheStore`] owns the key→item mapping of one cache and fans every
//! mutation out to registered [`CacheObserver`]s.

pub mod cache_store;
pub mod observer;

pub use cache_store::{CacheStore, StoreStats};
pub use observer::{CacheObserver, ObserverResult};
