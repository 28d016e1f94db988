//! Retry decorator for data sources.

use crate::error::{CacheError, CacheResult};
use crate::resilience::{RetryError, RetryPolicy};
use crate::source::{DataSource, DeltaSource, RefreshBatch};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Wraps a [`DataSource`] or [`DeltaSource`] so every call goes through a
/// [`RetryPolicy`]. The wrapped source is unaware of the retries.
#[derive(Debug)]
pub struct RetryingSource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingSource<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn map_error(&self, error: RetryError<CacheError>, operation: &str) -> CacheError {
        match error {
            // a source that noticed the cancellation itself is not unavailable
            RetryError::Exhausted {
                last: last @ CacheError::Cancelled { .. },
                ..
            } => last,
            RetryError::Exhausted { attempts, last } => {
                CacheError::source_unavailable(self.policy.label(), attempts, last.to_string())
            }
            RetryError::Timeout { timeout_ms, .. } => {
                CacheError::timeout(format!("{}.{operation}", self.policy.label()), timeout_ms)
            }
            RetryError::Cancelled { .. } => {
                CacheError::cancelled(format!("{}.{operation}", self.policy.label()))
            }
        }
    }
}

#[async_trait]
impl<K, V, S> DataSource<K, V> for RetryingSource<S>
where
    S: DataSource<K, V>,
    K: Send + 'static,
    V: Send + 'static,
{
    async fn load_all(&self, cancel: &CancellationToken) -> CacheResult<Vec<(K, V)>> {
        self.policy
            .execute(|| self.inner.load_all(cancel), cancel)
            .await
            .map_err(|error| self.map_error(error, "load_all"))
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }
}

#[async_trait]
impl<K, V, C, S> DeltaSource<K, V, C> for RetryingSource<S>
where
    S: DeltaSource<K, V, C>,
    K: Send + 'static,
    V: Send + 'static,
    C: Send + Sync + 'static,
{
    async fn get_updated_items(
        &self,
        last_cursor: Option<&C>,
        cancel: &CancellationToken,
    ) -> CacheResult<RefreshBatch<K, V, C>> {
        self.policy
            .execute(|| self.inner.get_updated_items(last_cursor, cancel), cancel)
            .await
            .map_err(|error| self.map_error(error, "get_updated_items"))
    }

    fn source_name(&self) -> &str {
        self.inner.source_name()
    }
}
