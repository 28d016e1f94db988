//! # Cache Error Types
//!
//! Structured error handling for the cache subsystem using thiserror.
//! Per-item refresh failures are logged and isolated by the refresher; the
//! variants classified by [`CacheError::is_fatal`] must stop startup instead.

use thiserror::Error;

/// Errors surfaced by the cache store, its loaders and its refreshers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache '{cache}' is not initialized")]
    NotInitialized { cache: String },

    #[error("Operation lost race: {cache}: {operation} on key {key}")]
    OperationLostRace {
        cache: String,
        key: String,
        operation: String,
    },

    #[error("No refresh handler registered for change kind {kind}")]
    NoHandlerForKind { kind: String },

    #[error("Data source unavailable: {label} after {attempts} attempt(s): {message}")]
    SourceUnavailable {
        label: String,
        attempts: u32,
        message: String,
    },

    #[error("Operation timed out: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Invalid delta for cache '{cache}' key {key}: {reason}")]
    InvalidDelta {
        cache: String,
        key: String,
        reason: String,
    },

    #[error("Cache initialization failed for: {}", failed.join(", "))]
    InitializationFailed { failed: Vec<String> },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Configuration error: {component}: {message}")]
    Configuration { component: String, message: String },
}

impl CacheError {
    /// Create a not-initialized error for the named cache
    pub fn not_initialized(cache: impl Into<String>) -> Self {
        Self::NotInitialized {
            cache: cache.into(),
        }
    }

    /// Create a lost-race error
    pub fn operation_lost_race(
        cache: impl Into<String>,
        key: impl std::fmt::Debug,
        operation: impl Into<String>,
    ) -> Self {
        Self::OperationLostRace {
            cache: cache.into(),
            key: format!("{key:?}"),
            operation: operation.into(),
        }
    }

    /// Create a missing-handler error
    pub fn no_handler_for_kind(kind: impl std::fmt::Display) -> Self {
        Self::NoHandlerForKind {
            kind: kind.to_string(),
        }
    }

    /// Create a source-unavailable error
    pub fn source_unavailable(
        label: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::SourceUnavailable {
            label: label.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create an invalid-delta error
    pub fn invalid_delta(
        cache: impl Into<String>,
        key: impl std::fmt::Debug,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidDelta {
            cache: cache.into(),
            key: format!("{key:?}"),
            reason: reason.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Errors that indicate a broken composition or a cache that must not serve
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoHandlerForKind { .. }
                | Self::InitializationFailed { .. }
                | Self::Configuration { .. }
        )
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
