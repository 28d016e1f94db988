//! # Cache Configuration
//!
//! Configuration for refresh cadence and source-call hardening. Mirrors the
//! layered approach used elsewhere in the crate: environment-specific presets,
//! explicit `ITEMS_CACHE_*` variable overrides, and optional file + environment
//! layering through [`ConfigManager`].
//!
//! ## Usage
//!
//! ```rust
//! use items_cache::config::CacheConfig;
//!
//! let config = CacheConfig::from_environment();
//! config.validate().expect("valid configuration");
//! println!("refresh every {:?}", config.refresh.interval());
//! ```

pub mod error;
pub mod loader;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Hot-reloadable refresh settings, re-read by the scheduler on every tick
pub type SharedRefreshConfig = Arc<RwLock<RefreshConfig>>;

/// Root configuration for a cache deployment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Polling refresh settings
    pub refresh: RefreshConfig,
    /// Retry and timeout settings for data source calls
    pub retry: RetryConfig,
}

/// When the polling refresher records the cursor returned by its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Record the cursor right after the fetch. A delta that fails to apply is
    /// never revisited (at-most-once).
    AdvanceOnFetch,
    /// Record the cursor only when the whole batch applied. A failed batch is
    /// fetched again on the next cycle, so handlers must be idempotent.
    #[default]
    AdvanceOnSuccess,
}

impl std::str::FromStr for CursorPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advance_on_fetch" | "on_fetch" | "fetch" => Ok(Self::AdvanceOnFetch),
            "advance_on_success" | "on_success" | "success" => Ok(Self::AdvanceOnSuccess),
            other => Err(ConfigurationError::invalid_value(
                "refresh.cursor_policy",
                other,
                "expected advance_on_fetch or advance_on_success",
            )),
        }
    }
}

/// Polling refresh configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Delay between polling cycles
    pub interval_ms: u64,
    pub cursor_policy: CursorPolicy,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            cursor_policy: CursorPolicy::AdvanceOnSuccess,
        }
    }
}

impl RefreshConfig {
    /// Get refresh interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Wrap into the shared handle consumed by the refresh scheduler
    pub fn shared(self) -> SharedRefreshConfig {
        Arc::new(RwLock::new(self))
    }
}

/// Bounded exponential backoff with an outer deadline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Budget covering every attempt and every backoff wait
    pub operation_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            operation_timeout_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Backoff to wait before `attempt` (1-based).
    ///
    /// Attempt 1 runs immediately; attempt k waits
    /// `min(initial_delay * 2^(k-2), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
        self.initial_delay()
            .saturating_mul(factor)
            .min(self.max_delay())
    }
}

impl CacheConfig {
    /// Create test-optimized configuration with fast cycles
    pub fn for_test() -> Self {
        Self {
            refresh: RefreshConfig {
                interval_ms: 50,
                cursor_policy: CursorPolicy::AdvanceOnSuccess,
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 10,
                max_delay_ms: 100,
                operation_timeout_ms: 1_000,
            },
        }
    }

    /// Create development-optimized configuration
    pub fn for_development() -> Self {
        Self {
            refresh: RefreshConfig {
                interval_ms: 5_000,
                cursor_policy: CursorPolicy::AdvanceOnSuccess,
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 500,
                max_delay_ms: 5_000,
                operation_timeout_ms: 15_000,
            },
        }
    }

    /// Load configuration from environment or use defaults
    pub fn from_environment() -> Self {
        let environment = detect_environment();

        let config = match environment.as_str() {
            "test" => {
                info!("Loading test cache configuration (fast cycles)");
                Self::for_test()
            }
            "development" => {
                info!("Loading development cache configuration");
                Self::for_development()
            }
            _ => {
                info!("Loading production cache configuration");
                Self::default()
            }
        };

        config.with_env_overrides()
    }

    /// Apply environment variable overrides to configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(ms) = parse_env::<u64>("ITEMS_CACHE_REFRESH_INTERVAL_MS") {
            self.refresh.interval_ms = ms;
            info!("Refresh interval override: {}ms", ms);
        }

        if let Ok(policy) = env::var("ITEMS_CACHE_CURSOR_POLICY") {
            match policy.parse::<CursorPolicy>() {
                Ok(policy) => {
                    self.refresh.cursor_policy = policy;
                    info!("Cursor policy override: {:?}", policy);
                }
                Err(e) => warn!("Ignoring cursor policy override: {}", e),
            }
        }

        if let Some(attempts) = parse_env::<u32>("ITEMS_CACHE_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts;
            info!("Retry max attempts override: {}", attempts);
        }

        if let Some(ms) = parse_env::<u64>("ITEMS_CACHE_RETRY_INITIAL_DELAY_MS") {
            self.retry.initial_delay_ms = ms;
            info!("Retry initial delay override: {}ms", ms);
        }

        if let Some(ms) = parse_env::<u64>("ITEMS_CACHE_RETRY_MAX_DELAY_MS") {
            self.retry.max_delay_ms = ms;
            info!("Retry max delay override: {}ms", ms);
        }

        if let Some(ms) = parse_env::<u64>("ITEMS_CACHE_RETRY_OPERATION_TIMEOUT_MS") {
            self.retry.operation_timeout_ms = ms;
            info!("Retry operation timeout override: {}ms", ms);
        }

        self
    }

    /// Log current configuration for debugging
    pub fn log_configuration(&self) {
        info!("Items Cache Configuration:");
        info!(
            "  Refresh: every {}ms, cursor policy {:?}",
            self.refresh.interval_ms, self.refresh.cursor_policy
        );
        info!(
            "  Retry: {} attempts, {}ms initial delay, {}ms max delay, {}ms timeout",
            self.retry.max_attempts,
            self.retry.initial_delay_ms,
            self.retry.max_delay_ms,
            self.retry.operation_timeout_ms
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.refresh.interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "refresh.interval_ms",
                "0",
                "refresh interval must be greater than 0",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }

        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "retry.initial_delay_ms",
                self.retry.initial_delay_ms.to_string(),
                "initial delay must not exceed max delay",
            ));
        }

        if self.retry.operation_timeout_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.operation_timeout_ms",
                "0",
                "operation timeout must be greater than 0",
            ));
        }

        if self.retry.operation_timeout_ms < self.retry.initial_delay_ms {
            warn!(
                "Operation timeout ({}ms) is shorter than the first backoff ({}ms) - retries will never run",
                self.retry.operation_timeout_ms, self.retry.initial_delay_ms
            );
        }

        Ok(())
    }
}

/// Detect the deployment environment from common environment variables
pub(crate) fn detect_environment() -> String {
    env::var("ITEMS_CACHE_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| "production".to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable value for {}: {:?}", name, raw);
            None
        }
    }
}
