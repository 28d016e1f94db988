//! # Polling Refresher
//!
//! Pulls deltas from a [`DeltaSource`] and applies them to a store through
//! [`HandlerDispatch`].
//!
//! ## Cycle protocol
//!
//! 1. Acquire the single-flight guard. The last cursor lives inside it, so
//!    overlapping cycles for one cache can never observe or advance it twice.
//! 2. Acquire the store's write lock, which keeps a bulk load of the same
//!    cache out until the cycle ends.
//! 3. Fetch the deltas since the last cursor.
//! 4. Resolve a handler for every delta. A missing handler aborts the cycle
//!    before anything is written.
//! 5. Apply every delta. A delta that fails is logged and counted; the rest of
//!    the batch still runs. A fatal handler error aborts the cycle.
//! 6. Record the new cursor according to the [`CursorPolicy`]:
//!    `AdvanceOnFetch` records it whatever the per-delta results,
//!    `AdvanceOnSuccess` only when no delta failed.
//!
//! Cancellation is honoured while waiting for either guard and during the
//! fetch. Once a batch starts applying it runs to completion.

use crate::config::CursorPolicy;
use crate::error::{CacheError, CacheResult};
use crate::logging::{log_cache_operation, log_error};
use crate::refresh::HandlerDispatch;
use crate::source::{DeltaSource, RefreshBatch};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Object-safe view of a refresher, driven by the
/// [`RefreshScheduler`](crate::refresh::RefreshScheduler)
#[async_trait]
pub trait Refresh: Send + Sync {
    fn label(&self) -> &str;

    /// Run one cycle; `false` when the fetch failed or was cancelled
    async fn refresh(&self, cancel: &CancellationToken) -> bool;
}

/// Counts for one refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    /// Deltas returned by the source
    pub fetched: usize,
    /// Deltas the store took
    pub applied: usize,
    /// Deltas the store reported as having no effect
    pub lost_races: usize,
    /// Deltas that raised an error
    pub failed: usize,
    pub cursor_advanced: bool,
}

pub struct PollingRefresher<K, V, C> {
    label: String,
    source: Arc<dyn DeltaSource<K, V, C>>,
    dispatch: HandlerDispatch<K, V>,
    cursor_policy: CursorPolicy,
    /// Single-flight guard holding the last recorded cursor
    cursor: Mutex<Option<C>>,
}

impl<K, V, C> PollingRefresher<K, V, C>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clone + Debug + Send + Sync + 'static,
{
    pub fn new(
        label: impl Into<String>,
        source: Arc<dyn DeltaSource<K, V, C>>,
        dispatch: HandlerDispatch<K, V>,
    ) -> Self {
        Self {
            label: label.into(),
            source,
            dispatch,
            cursor_policy: CursorPolicy::default(),
            cursor: Mutex::new(None),
        }
    }

    pub fn with_cursor_policy(mut self, cursor_policy: CursorPolicy) -> Self {
        self.cursor_policy = cursor_policy;
        self
    }

    /// Start from a previously persisted cursor instead of `None`
    pub fn with_initial_cursor(self, cursor: C) -> Self {
        Self {
            cursor: Mutex::new(Some(cursor)),
            ..self
        }
    }

    pub fn cursor_policy(&self) -> CursorPolicy {
        self.cursor_policy
    }

    /// Last recorded cursor. Waits for an in-flight cycle to finish.
    pub async fn cursor(&self) -> Option<C> {
        self.cursor.lock().await.clone()
    }

    /// Run one cycle and report what it did.
    ///
    /// A fatal error (a delta kind with no handler, or a handler reporting a
    /// fatal failure) stops the batch and returns `Err` with the cursor
    /// unchanged.
    pub async fn refresh_cycle(&self, cancel: &CancellationToken) -> CacheResult<RefreshOutcome> {
        let operation = || format!("{}.refresh", self.label);

        let mut cursor = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CacheError::cancelled(operation())),
            guard = self.cursor.lock() => guard,
        };
        let _writes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CacheError::cancelled(operation())),
            guard = self.dispatch.store().lock_writes() => guard,
        };

        let started = Instant::now();
        let RefreshBatch {
            deltas,
            cursor: next_cursor,
        } = self
            .source
            .get_updated_items(cursor.as_ref(), cancel)
            .await?;

        let mut outcome = RefreshOutcome {
            fetched: deltas.len(),
            ..RefreshOutcome::default()
        };
        debug!(
            cache = %self.label,
            fetched = outcome.fetched,
            next_cursor = ?next_cursor,
            "Fetched refresh batch"
        );

        // resolve every handler before touching the store
        let handlers = deltas
            .iter()
            .map(|delta| self.dispatch.create(delta.kind))
            .collect::<CacheResult<Vec<_>>>()?;

        for (delta, handler) in deltas.into_iter().zip(handlers) {
            let kind = delta.kind;
            match handler.handle(delta.key.clone(), delta.item) {
                Ok(true) => outcome.applied += 1,
                Ok(false) => outcome.lost_races += 1,
                Err(error) if error.is_fatal() => {
                    warn!(
                        cache = %self.label,
                        key = ?delta.key,
                        kind = %kind,
                        applied = outcome.applied,
                        "Fatal handler error, abandoning batch"
                    );
                    return Err(error);
                }
                Err(error) => {
                    outcome.failed += 1;
                    warn!(
                        cache = %self.label,
                        key = ?delta.key,
                        kind = %kind,
                        error = %error,
                        "Failed to apply delta, continuing with batch"
                    );
                }
            }
        }

        if self.cursor_policy == CursorPolicy::AdvanceOnFetch || outcome.failed == 0 {
            *cursor = Some(next_cursor);
            outcome.cursor_advanced = true;
        } else {
            warn!(
                cache = %self.label,
                failed = outcome.failed,
                held_cursor = ?cursor.as_ref(),
                "Cursor held back, batch will be fetched again"
            );
        }

        if outcome.fetched > 0 {
            info!(
                cache = %self.label,
                fetched = outcome.fetched,
                applied = outcome.applied,
                lost_races = outcome.lost_races,
                failed = outcome.failed,
                duration_ms = started.elapsed().as_millis() as u64,
                "🔄 Refresh batch applied"
            );
        }

        Ok(outcome)
    }
}

#[async_trait]
impl<K, V, C> Refresh for PollingRefresher<K, V, C>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clone + Debug + Send + Sync + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    async fn refresh(&self, cancel: &CancellationToken) -> bool {
        match self.refresh_cycle(cancel).await {
            Ok(outcome) => {
                if outcome.fetched > 0 {
                    let details = format!(
                        "applied={} lost_races={} failed={}",
                        outcome.applied, outcome.lost_races, outcome.failed
                    );
                    log_cache_operation(
                        "refresh",
                        &self.label,
                        "success",
                        Some(outcome.fetched),
                        Some(&details),
                    );
                }
                true
            }
            Err(CacheError::Cancelled { .. }) => {
                debug!(cache = %self.label, "Refresh cancelled");
                false
            }
            Err(error) => {
                log_error(
                    "polling_refresher",
                    "refresh",
                    &error.to_string(),
                    Some(&self.label),
                );
                false
            }
        }
    }
}

impl<K, V, C> std::fmt::Debug for PollingRefresher<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingRefresher")
            .field("label", &self.label)
            .field("source", &self.source.source_name())
            .field("cursor_policy", &self.cursor_policy)
            .finish_non_exhaustive()
    }
}
