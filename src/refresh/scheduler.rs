//! # Refresh Scheduler
//!
//! Background loop driving every registered refresher. Each tick re-reads the
//! interval from the shared refresh configuration, sleeps, then runs all
//! refreshers concurrently. Cancellation is checked while sleeping only, so a
//! cycle that has started always finishes.

use crate::config::SharedRefreshConfig;
use crate::refresh::Refresh;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct RefreshScheduler {
    refreshers: Vec<Arc<dyn Refresh>>,
    config: SharedRefreshConfig,
    cycles: AtomicU64,
    failed_refreshes: AtomicU64,
}

impl RefreshScheduler {
    pub fn new(config: SharedRefreshConfig) -> Self {
        Self {
            refreshers: Vec::new(),
            config,
            cycles: AtomicU64::new(0),
            failed_refreshes: AtomicU64::new(0),
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn Refresh>) -> Self {
        self.refreshers.push(refresher);
        self
    }

    pub fn refresher_count(&self) -> usize {
        self.refreshers.len()
    }

    /// Completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Refresh calls that returned `false`
    pub fn failed_refreshes(&self) -> u64 {
        self.failed_refreshes.load(Ordering::Relaxed)
    }

    /// Run one cycle over every refresher
    pub async fn run_cycle(&self, cancel: &CancellationToken) {
        let results = join_all(self.refreshers.iter().map(|refresher| async move {
            (refresher.label(), refresher.refresh(cancel).await)
        }))
        .await;

        for (label, refreshed) in results {
            if !refreshed {
                self.failed_refreshes.fetch_add(1, Ordering::Relaxed);
                warn!(cache = label, "Refresh cycle did not complete");
            }
        }
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Loop until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            refresher_count = self.refreshers.len(),
            interval_ms = self.config.read().interval_ms,
            "🔄 Refresh scheduler started"
        );

        loop {
            let interval = self.config.read().interval();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(cycles = self.cycles(), "🛑 Refresh scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    debug!(interval_ms = interval.as_millis() as u64, "Refresh tick");
                    self.run_cycle(&cancel).await;
                }
            }
        }
    }

    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.refreshers.iter().map(|r| r.label()).collect();
        f.debug_struct("RefreshScheduler")
            .field("refreshers", &labels)
            .field("cycles", &self.cycles())
            .finish()
    }
}
