//! # Incremental Refresh
//!
//! Delta polling for caches backed by a [`DeltaSource`](crate::source::DeltaSource):
//!
//! - [`HandlerDispatch`] turns each delta into a store mutation
//! - [`PollingRefresher`] runs one single-flight fetch-and-apply cycle
//! - [`RefreshScheduler`] drives every refresher on the configured interval

pub mod handlers;
pub mod poller;
pub mod scheduler;

pub use handlers::{DeletedHandler, HandlerDispatch, RefreshHandler, UpdatedHandler};
pub use poller::{PollingRefresher, Refresh, RefreshOutcome};
pub use scheduler::RefreshScheduler;
