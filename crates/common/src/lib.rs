//! Shared identifier and version types used across the order subsystem.

mod types;

pub use types::{OrderId, ProductId, UserId, Version};
