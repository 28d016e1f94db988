//! # Secondary Indices
//!
//! Derived views over a cache store, maintained through its observer events.

pub mod grouped_index;

pub use grouped_index::GroupedIndex;
