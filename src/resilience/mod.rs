//! # Resilience Module
//!
//! Fault tolerance for calls into external data sources.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use items_cache::config::RetryConfig;
//! use items_cache::resilience::RetryPolicy;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::new("products_db", RetryConfig::default());
//! let cancel = CancellationToken::new();
//!
//! let _rows = policy
//!     .execute(|| async { Ok::<_, std::io::Error>(vec![1, 2, 3]) }, &cancel)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{RetryError, RetryPolicy};
