//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, UserId, Version};

use crate::error::ValidationError;

use super::{CustomerSnapshot, LineItem, LineItemChange, Money};

/// Order aggregate root.
///
/// Holds the customer snapshot, the ordered line items and the totals
/// derived from them. Totals are private and only ever produced by
/// [`Order::recompute`], so no caller can set them directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,

    /// Version read from the store; `Version::initial()` until first saved.
    version: Version,

    user_id: UserId,
    customer: CustomerSnapshot,
    line_items: Vec<LineItem>,

    /// Sum of all line quantities.
    total_items: u64,

    /// Sum of all line totals.
    total: Money,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_deleted: bool,
}

impl Order {
    /// Builds a new, never-persisted order with totals already computed.
    ///
    /// The order is not validated; call [`validate`] before persisting.
    pub fn new(
        id: OrderId,
        user_id: UserId,
        customer: CustomerSnapshot,
        line_items: Vec<LineItem>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut order = Self {
            id,
            version: Version::initial(),
            user_id,
            customer,
            line_items,
            total_items: 0,
            total: Money::zero(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        order.recompute();
        order
    }

    /// Rebuilds an order from stored fields, recomputing totals.
    pub(crate) fn restore(
        id: OrderId,
        user_id: UserId,
        customer: CustomerSnapshot,
        line_items: Vec<LineItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        is_deleted: bool,
    ) -> Self {
        let mut order = Self::new(id, user_id, customer, line_items, created_at);
        order.updated_at = updated_at;
        order.is_deleted = is_deleted;
        order
    }

    /// Returns the order with the given store version attached.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn customer(&self) -> &CustomerSnapshot {
        &self.customer
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// Returns the line for a product, if any.
    pub fn line_item(&self, product_id: ProductId) -> Option<&LineItem> {
        self.line_items.iter().find(|l| l.product_id == product_id)
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_deleted(&self) -> bool {
        self.is_deleted
    }
}

// Mutation methods
impl Order {
    /// Recalculates `total` and `total_items` from the current line items.
    pub fn recompute(&mut self) {
        self.total_items = self.line_items.iter().map(|l| u64::from(l.quantity)).sum();
        self.total = self.line_items.iter().map(LineItem::line_total).sum();
    }

    /// Applies line item changes in order.
    ///
    /// Either every change applies or the order is left untouched.
    /// Totals are recomputed; timestamps are not changed.
    pub fn apply_changes(&mut self, changes: &[LineItemChange]) -> Result<(), ValidationError> {
        if self.is_deleted {
            return Err(ValidationError::OrderDeleted);
        }

        let mut lines = self.line_items.clone();
        for change in changes {
            apply_change(&mut lines, change)?;
        }

        self.line_items = lines;
        self.recompute();
        Ok(())
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Soft-deletes the order.
    ///
    /// Returns false, leaving the order untouched, if it was already deleted.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_deleted {
            return false;
        }
        self.is_deleted = true;
        self.updated_at = now;
        true
    }
}

fn apply_change(lines: &mut Vec<LineItem>, change: &LineItemChange) -> Result<(), ValidationError> {
    match change {
        LineItemChange::Add(item) => {
            // Merging keeps the price snapshot of the existing line
            if let Some(existing) = lines.iter_mut().find(|l| l.product_id == item.product_id) {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            } else {
                lines.push(item.clone());
            }
        }
        LineItemChange::Remove { product_id } => {
            let position = lines
                .iter()
                .position(|l| l.product_id == *product_id)
                .ok_or(ValidationError::LineItemNotFound {
                    product_id: *product_id,
                })?;
            lines.remove(position);
        }
        LineItemChange::SetQuantity {
            product_id,
            quantity,
        } => {
            if *quantity == 0 {
                return Err(ValidationError::InvalidQuantity {
                    product_id: *product_id,
                    quantity: 0,
                });
            }
            let line = lines
                .iter_mut()
                .find(|l| l.product_id == *product_id)
                .ok_or(ValidationError::LineItemNotFound {
                    product_id: *product_id,
                })?;
            line.quantity = *quantity;
        }
        LineItemChange::Replace(items) => {
            *lines = items.clone();
        }
    }
    Ok(())
}

/// Returns the order with `total` and `total_items` recalculated.
pub fn recompute_totals(mut order: Order) -> Order {
    order.recompute();
    order
}

/// Checks the order's invariants.
///
/// The order needs at least one line item, every line needs a quantity of
/// at least 1 and a non-negative price, and the customer snapshot must be
/// complete.
pub fn validate(order: &Order) -> Result<(), ValidationError> {
    if order.line_items.is_empty() {
        return Err(ValidationError::EmptyLineItems);
    }
    for line in &order.line_items {
        line.validate()?;
    }
    order.customer.validate()
}
