#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Items Cache
//!
//! In-process keyed item cache kept warm from an external source.
//!
//! ## Overview
//!
//! A cache is a [`CacheStore`] populated once at startup by a [`CacheLoader`]
//! and, optionally, kept fresh by a [`PollingRefresher`] that applies deltas
//! from a cursor-based source. Derived [`GroupedIndex`]es subscribe to the
//! store's mutation events and stay in step with it.
//!
//! ## Key Features
//!
//! - **Explicit initialization**: reads fail with `NotInitialized` until the
//!   first full load, never silently returning empty results
//! - **Atomic full replace**: readers see the old mapping or the new one
//! - **Synchronous observers**: an index reflects a write by the time the write
//!   returns, and a failing observer never affects the store or its peers
//! - **Single-flight loading and refresh** per cache
//! - **Retry with an outer deadline** around any source call
//! - **Fail-fast startup** through [`CacheHost`]
//!
//! ## Module Organization
//!
//! - [`store`] - Primary store and the observer contract
//! - [`index`] - Grouped secondary indices
//! - [`source`] - Full-snapshot and delta source contracts
//! - [`loader`] - Bootstrap loading and startup orchestration
//! - [`refresh`] - Delta handlers, polling refresher, scheduler
//! - [`resilience`] - Retry policy
//! - [`bootstrap`] - Host lifecycle
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust
//! use items_cache::{CacheStore, GroupedIndex};
//! use std::sync::Arc;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Product {
//!     category: String,
//!     price: u32,
//! }
//!
//! let store = Arc::new(CacheStore::<u32, Product>::new("products"));
//! let by_category = Arc::new(GroupedIndex::<u32, Product, String>::new(
//!     "by_category",
//!     |p: &Product| p.category.clone(),
//! ));
//! store.register_observer(by_category.clone());
//!
//! store.replace(vec![
//!     (1, Product { category: "X".into(), price: 10 }),
//!     (2, Product { category: "Y".into(), price: 20 }),
//! ]);
//!
//! assert_eq!(store.count(), 2);
//! assert_eq!(by_category.get_by_group_key(&"X".to_string()).len(), 1);
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod logging;
pub mod refresh;
pub mod resilience;
pub mod source;
pub mod store;

pub use bootstrap::{CacheHost, CacheHostHandle, HostStatus};
pub use config::{CacheConfig, CursorPolicy, RefreshConfig, RetryConfig};
pub use error::{CacheError, CacheResult};
pub use index::GroupedIndex;
pub use loader::{CacheInitializer, CacheLoader, Load};
pub use refresh::{HandlerDispatch, PollingRefresher, Refresh, RefreshOutcome, RefreshScheduler};
pub use resilience::{RetryError, RetryPolicy};
pub use source::{
    ChangeKind, DataSource, DeltaSource, RefreshBatch, RefreshDelta, RetryingSource,
    VersionedMemorySource,
};
pub use store::{CacheObserver, CacheStore};
