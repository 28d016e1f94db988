//! # Cache Host Bootstrap
//!
//! Composition root and lifecycle for a set of caches:
//!
//! - **Fail-fast startup**: every registered loader must succeed before the
//!   host reports ready. On failure no background work is started.
//! - **Background refresh**: a [`RefreshScheduler`] is spawned only after
//!   initialization, and only when refreshers are registered.
//! - **Graceful shutdown**: cancellation is observed between refresh cycles,
//!   never in the middle of one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use items_cache::bootstrap::CacheHost;
//! use items_cache::loader::CacheLoader;
//! use items_cache::refresh::{HandlerDispatch, PollingRefresher};
//! use items_cache::source::VersionedMemorySource;
//! use items_cache::store::CacheStore;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(CacheStore::<u32, String>::new("products"));
//! let source = Arc::new(VersionedMemorySource::with_items("products", vec![(1, "A".to_string())]));
//!
//! let refresher = PollingRefresher::new("products", source.clone(), HandlerDispatch::for_store(store.clone()));
//! let mut handle = CacheHost::new()
//!     .with_loader(Arc::new(CacheLoader::new(store.clone(), source)))
//!     .with_refresher(Arc::new(refresher))
//!     .start(CancellationToken::new())
//!     .await?;
//!
//! assert_eq!(store.get(&1)?, Some("A".to_string()));
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::{ConfigManager, RefreshConfig, SharedRefreshConfig};
use crate::error::CacheResult;
use crate::loader::{CacheInitializer, Load};
use crate::refresh::{Refresh, RefreshScheduler};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Builder wiring loaders and refreshers into one host
pub struct CacheHost {
    initializer: CacheInitializer,
    refreshers: Vec<Arc<dyn Refresh>>,
    refresh_config: SharedRefreshConfig,
    environment: String,
}

impl Default for CacheHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheHost {
    pub fn new() -> Self {
        Self {
            initializer: CacheInitializer::new(),
            refreshers: Vec::new(),
            refresh_config: RefreshConfig::default().shared(),
            environment: crate::config::detect_environment(),
        }
    }

    /// Host whose refresh cadence follows the manager's hot-reloadable settings
    pub fn from_config_manager(manager: &ConfigManager) -> Self {
        Self {
            refresh_config: manager.refresh_handle(),
            environment: manager.environment().to_string(),
            ..Self::new()
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn Load>) -> Self {
        self.initializer.register(loader);
        self
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn Refresh>) -> Self {
        self.refreshers.push(refresher);
        self
    }

    pub fn with_refresh_config(mut self, refresh_config: SharedRefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    /// Initialize every cache, then start background refresh.
    ///
    /// Returns the initialization error without starting anything when a
    /// cache fails to load. Cancelling `cancel` stops the host as well.
    pub async fn start(self, cancel: CancellationToken) -> CacheResult<CacheHostHandle> {
        info!(
            environment = %self.environment,
            loader_count = self.initializer.loader_count(),
            refresher_count = self.refreshers.len(),
            "🚀 BOOTSTRAP: Starting cache host"
        );

        if let Err(err) = self.initializer.initialize(&cancel).await {
            error!(error = %err, "🔴 BOOTSTRAP: Cache initialization failed, host not started");
            return Err(err);
        }

        let shutdown = cancel.child_token();
        let (scheduler, task) = if self.refreshers.is_empty() {
            info!("📋 BOOTSTRAP: No refreshers registered, background refresh not started");
            (None, None)
        } else {
            let scheduler = Arc::new(
                self.refreshers
                    .into_iter()
                    .fold(RefreshScheduler::new(self.refresh_config.clone()), |scheduler, refresher| {
                        scheduler.with_refresher(refresher)
                    }),
            );
            let task = scheduler.clone().spawn(shutdown.clone());
            (Some(scheduler), Some(task))
        };

        info!("✅ BOOTSTRAP: Cache host ready");

        Ok(CacheHostHandle {
            shutdown,
            scheduler,
            task,
            refresh_config: self.refresh_config,
            environment: self.environment,
            cache_count: self.initializer.loader_count(),
        })
    }
}

/// Handle to a started host
pub struct CacheHostHandle {
    shutdown: CancellationToken,
    scheduler: Option<Arc<RefreshScheduler>>,
    task: Option<JoinHandle<()>>,
    refresh_config: SharedRefreshConfig,
    environment: String,
    cache_count: usize,
}

impl CacheHostHandle {
    /// Whether the host has not been shut down
    pub fn is_running(&self) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.task.as_ref().map_or(true, |task| !task.is_finished())
    }

    pub fn status(&self) -> HostStatus {
        HostStatus {
            running: self.is_running(),
            environment: self.environment.clone(),
            cache_count: self.cache_count,
            refresher_count: self
                .scheduler
                .as_ref()
                .map_or(0, |scheduler| scheduler.refresher_count()),
            refresh_cycles: self.scheduler.as_ref().map_or(0, |scheduler| scheduler.cycles()),
            failed_refreshes: self
                .scheduler
                .as_ref()
                .map_or(0, |scheduler| scheduler.failed_refreshes()),
            refresh_interval_ms: self.refresh_config.read().interval_ms,
        }
    }

    /// Stop background refresh and wait for the current cycle to finish
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();

        match self.task.take() {
            Some(task) => match task.await {
                Ok(()) => info!("🛑 Cache host stopped"),
                Err(err) => error!(error = %err, "Refresh scheduler task ended abnormally"),
            },
            None => warn!("Cache host has no background task to stop"),
        }
    }
}

/// Host status information
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostStatus {
    pub running: bool,
    pub environment: String,
    pub cache_count: usize,
    pub refresher_count: usize,
    pub refresh_cycles: u64,
    pub failed_refreshes: u64,
    pub refresh_interval_ms: u64,
}

impl std::fmt::Debug for CacheHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHost")
            .field("initializer", &self.initializer)
            .field("refresher_count", &self.refreshers.len())
            .field("environment", &self.environment)
            .finish()
    }
}
