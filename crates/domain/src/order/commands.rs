//! Order commands.

use common::{OrderId, ProductId, UserId, Version};

use super::{CustomerSnapshot, LineItem};

/// Command to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The user placing the order.
    pub user_id: UserId,

    /// Customer data captured at purchase time.
    pub customer: CustomerSnapshot,

    /// Initial line items, in order.
    pub line_items: Vec<LineItem>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(
        user_id: impl Into<UserId>,
        customer: CustomerSnapshot,
        line_items: Vec<LineItem>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            customer,
            line_items,
        }
    }
}

/// A single edit to an order's line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineItemChange {
    /// Adds a line, or increases the quantity of the existing line for the
    /// same product. The existing line keeps its original price.
    Add(LineItem),

    /// Removes the line for a product.
    Remove { product_id: ProductId },

    /// Sets the quantity of an existing line (must be at least 1).
    SetQuantity { product_id: ProductId, quantity: u32 },

    /// Replaces every line.
    Replace(Vec<LineItem>),
}

/// Command to update an existing order's line items.
#[derive(Debug, Clone)]
pub struct UpdateOrder {
    /// The order to update.
    pub order_id: OrderId,

    /// When set, the update fails with a conflict unless the stored order
    /// is still at this version.
    pub expected_version: Option<Version>,

    /// Changes applied in order, all or nothing.
    pub changes: Vec<LineItemChange>,
}

impl UpdateOrder {
    /// Creates an update that applies against whatever version is stored.
    pub fn new(order_id: OrderId, changes: Vec<LineItemChange>) -> Self {
        Self {
            order_id,
            expected_version: None,
            changes,
        }
    }

    /// Requires the stored order to be at `version`.
    pub fn expecting(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }
}
