//! # Bootstrap Loading
//!
//! [`CacheLoader`] fills one store from a full snapshot; [`CacheInitializer`]
//! runs every loader at startup and fails if any cache did not load.

pub mod cache_loader;
pub mod initializer;

pub use cache_loader::{CacheLoader, Load};
pub use initializer::CacheInitializer;
