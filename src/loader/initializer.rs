//! # Cache Initializer
//!
//! Startup fan-out over every registered loader. All loads run concurrently
//! and every one must succeed: a cache that never loaded must not serve.

use crate::error::{CacheError, CacheResult};
use crate::loader::Load;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Default)]
pub struct CacheInitializer {
    loaders: Vec<Arc<dyn Load>>,
}

impl CacheInitializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, loader: Arc<dyn Load>) {
        info!(cache = loader.label(), "Registered cache loader");
        self.loaders.push(loader);
    }

    pub fn with_loader(mut self, loader: Arc<dyn Load>) -> Self {
        self.register(loader);
        self
    }

    pub fn loader_count(&self) -> usize {
        self.loaders.len()
    }

    /// Run every loader; fails with the labels of the caches that did not load
    pub async fn initialize(&self, cancel: &CancellationToken) -> CacheResult<()> {
        let started = Instant::now();
        info!(loader_count = self.loaders.len(), "🚀 Initializing caches");

        let results = join_all(self.loaders.iter().map(|loader| async move {
            let loaded = loader.load(cancel).await;
            (loader.label().to_string(), loaded)
        }))
        .await;

        let failed: Vec<String> = results
            .into_iter()
            .filter_map(|(label, loaded)| (!loaded).then_some(label))
            .collect();

        if !failed.is_empty() {
            error!(
                failed = ?failed,
                duration_ms = started.elapsed().as_millis() as u64,
                "🔴 Cache initialization failed"
            );
            return Err(CacheError::InitializationFailed { failed });
        }

        info!(
            loader_count = self.loaders.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "🟢 All caches initialized"
        );
        Ok(())
    }

    /// [`initialize`](Self::initialize) reduced to success or failure
    pub async fn try_initialize(&self, cancel: &CancellationToken) -> bool {
        self.initialize(cancel).await.is_ok()
    }
}

impl std::fmt::Debug for CacheInitializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.loaders.iter().map(|loader| loader.label()).collect();
        f.debug_struct("CacheInitializer")
            .field("loaders", &labels)
            .finish()
    }
}
