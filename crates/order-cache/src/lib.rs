//! Order read cache.
//!
//! [`OrderCache`] answers reads by id without touching the repository when
//! it can, and never answers with a state older than the last event
//! published before the read.

pub mod cache;

pub use cache::{CacheConfig, OrderCache};
