//! Order persistence.
//!
//! [`OrderRepository`] is the authoritative store for orders. Orders are
//! kept as whole documents with a version for optimistic concurrency:
//! a write only succeeds if the stored version is the one the writer read.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod repository;

pub use common::{OrderId, UserId, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
pub use query::{OrderQuery, Page};
pub use repository::{OrderRepository, OrderRepositoryExt};
