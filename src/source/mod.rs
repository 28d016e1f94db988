//! # Data Sources
//!
//! The two external contracts a cache is fed from:
//!
//! - [`DataSource`]: returns a complete, authoritative snapshot. Used by the
//!   bootstrap loader and callable any number of times.
//! - [`DeltaSource`]: returns the changes since an opaque cursor plus the
//!   cursor to resume from next time. Implementations must capture the new
//!   cursor *before* running the query that uses the old one, so writes that
//!   land while the query runs are picked up by the following cycle.
//!
//! Any source can be hardened with [`RetryingSource`].

pub mod memory;
pub mod retrying;

use crate::error::CacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

pub use memory::VersionedMemorySource;
pub use retrying::RetryingSource;

/// Full-snapshot source consumed by the bootstrap loader
#[async_trait]
pub trait DataSource<K, V>: Send + Sync {
    /// Load every (key, item) pair currently in the source
    async fn load_all(&self, cancel: &CancellationToken) -> CacheResult<Vec<(K, V)>>;

    /// Get source name for identification in logs
    fn source_name(&self) -> &str {
        "unnamed_source"
    }
}

/// Delta-capable source consumed by the polling refresher
#[async_trait]
pub trait DeltaSource<K, V, C>: Send + Sync {
    /// Changes since `last_cursor` (`None` on the first call) and the cursor to
    /// pass on the next call
    async fn get_updated_items(
        &self,
        last_cursor: Option<&C>,
        cancel: &CancellationToken,
    ) -> CacheResult<RefreshBatch<K, V, C>>;

    /// Get source name for identification in logs
    fn source_name(&self) -> &str {
        "unnamed_delta_source"
    }
}

/// Kind of change carried by a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Updated,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Updated => write!(f, "Updated"),
            ChangeKind::Deleted => write!(f, "Deleted"),
        }
    }
}

/// One unit of change reported by a delta source
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshDelta<K, V> {
    pub key: K,
    pub item: Option<V>,
    pub kind: ChangeKind,
}

impl<K, V> RefreshDelta<K, V> {
    pub fn updated(key: K, item: V) -> Self {
        Self {
            key,
            item: Some(item),
            kind: ChangeKind::Updated,
        }
    }

    pub fn deleted(key: K) -> Self {
        Self {
            key,
            item: None,
            kind: ChangeKind::Deleted,
        }
    }
}

/// Result of one delta query
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshBatch<K, V, C> {
    pub deltas: Vec<RefreshDelta<K, V>>,
    /// Cursor to resume from on the next call
    pub cursor: C,
}

impl<K, V, C> RefreshBatch<K, V, C> {
    pub fn new(deltas: Vec<RefreshDelta<K, V>>, cursor: C) -> Self {
        Self { deltas, cursor }
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}
