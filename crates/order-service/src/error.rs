//! Service error types.

use domain::{OrderId, ValidationError, Version};
use order_store::StoreError;
use thiserror::Error;

/// Errors returned by [`OrderService`](crate::OrderService).
///
/// Every error is raised before anything is written or published.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The order breaks an invariant.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No active order with this id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order changed since the caller read it.
    #[error("Order {order_id} was modified concurrently: expected version {expected}, found {actual}")]
    Conflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// The repository failed.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            } => ServiceError::Conflict {
                order_id,
                expected,
                actual,
            },
            other => ServiceError::Store(other),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
