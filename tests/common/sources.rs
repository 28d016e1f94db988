use super::Product;
use async_trait::async_trait;
use items_cache::{CacheError, CacheResult, DataSource, DeltaSource, RefreshBatch, RefreshDelta};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Full snapshot source that fails a fixed number of times first
pub struct FlakySource {
    items: Vec<(u32, Product)>,
    failures_before_success: u32,
    pub calls: AtomicU32,
}

impl FlakySource {
    pub fn new(items: Vec<(u32, Product)>, failures_before_success: u32) -> Self {
        Self {
            items,
            failures_before_success,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource<u32, Product> for FlakySource {
    async fn load_all(&self, _cancel: &CancellationToken) -> CacheResult<Vec<(u32, Product)>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures_before_success {
            return Err(CacheError::source_unavailable(
                "products_db",
                1,
                format!("connection refused (call {call})"),
            ));
        }
        Ok(self.items.clone())
    }

    fn source_name(&self) -> &str {
        "flaky_products"
    }
}

/// Delta source that replays scripted batches, records the cursors it was
/// given and tracks how many calls overlap in time
pub struct ScriptedDeltaSource {
    batches: Mutex<VecDeque<CacheResult<RefreshBatch<u32, Product, u64>>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub seen_cursors: Mutex<Vec<Option<u64>>>,
}

impl ScriptedDeltaSource {
    pub fn new(batches: Vec<CacheResult<RefreshBatch<u32, Product, u64>>>) -> Self {
        Self::with_delay(batches, Duration::ZERO)
    }

    pub fn with_delay(
        batches: Vec<CacheResult<RefreshBatch<u32, Product, u64>>>,
        delay: Duration,
    ) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen_cursors: Mutex::new(Vec::new()),
        }
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen_cursors(&self) -> Vec<Option<u64>> {
        self.seen_cursors.lock().clone()
    }
}

#[async_trait]
impl DeltaSource<u32, Product, u64> for ScriptedDeltaSource {
    async fn get_updated_items(
        &self,
        last_cursor: Option<&u64>,
        _cancel: &CancellationToken,
    ) -> CacheResult<RefreshBatch<u32, Product, u64>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen_cursors.lock().push(last_cursor.copied());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self.batches.lock().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        next.unwrap_or_else(|| {
            Ok(RefreshBatch::new(
                Vec::new(),
                last_cursor.copied().unwrap_or(0),
            ))
        })
    }

    fn source_name(&self) -> &str {
        "scripted_deltas"
    }
}

/// Shorthand for a scripted batch
pub fn batch(
    deltas: Vec<RefreshDelta<u32, Product>>,
    cursor: u64,
) -> CacheResult<RefreshBatch<u32, Product, u64>> {
    Ok(RefreshBatch::new(deltas, cursor))
}
