//! Domain error types.

use common::ProductId;
use thiserror::Error;

use crate::order::Money;

/// Invariant violations detected on an order before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The order has no line items.
    #[error("Order must contain at least one line item")]
    EmptyLineItems,

    /// A line item quantity is below 1.
    #[error("Invalid quantity {quantity} for product {product_id} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// A line item unit price is negative.
    #[error("Invalid price {price} for product {product_id} (must not be negative)")]
    NegativePrice { product_id: ProductId, price: Money },

    /// A change referenced a product the order does not contain.
    #[error("Order has no line item for product {product_id}")]
    LineItemNotFound { product_id: ProductId },

    /// The customer snapshot is incomplete or malformed.
    #[error("Invalid customer {field}: {reason}")]
    InvalidCustomer {
        field: &'static str,
        reason: &'static str,
    },

    /// The order is soft-deleted and can no longer change.
    #[error("Order is deleted")]
    OrderDeleted,
}

/// Errors translating a persisted document back into an order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    /// A monetary amount was NaN or infinite.
    #[error("Invalid amount {amount} for product {product_id}")]
    InvalidAmount { product_id: ProductId, amount: f64 },

    /// A quantity did not fit an unsigned 32-bit integer.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: ProductId, quantity: i64 },
}
