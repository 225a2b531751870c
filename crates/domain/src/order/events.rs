//! Order change events.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Deserialize, Serialize};

use super::Order;

/// What happened to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    Created,
    Updated,
    Deleted,
}

impl OrderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventKind::Created => "CREATED",
            OrderEventKind::Updated => "UPDATED",
            OrderEventKind::Deleted => "DELETED",
        }
    }
}

impl std::fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published after a mutation has been committed to the store.
///
/// Carries the full committed order, so consumers never have to read the
/// store back.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub kind: OrderEventKind,
    pub order: Order,
    pub occurred_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(kind: OrderEventKind, order: Order) -> Self {
        Self {
            kind,
            order,
            occurred_at: Utc::now(),
        }
    }

    pub fn created(order: Order) -> Self {
        Self::new(OrderEventKind::Created, order)
    }

    pub fn updated(order: Order) -> Self {
        Self::new(OrderEventKind::Updated, order)
    }

    pub fn deleted(order: Order) -> Self {
        Self::new(OrderEventKind::Deleted, order)
    }

    pub fn order_id(&self) -> OrderId {
        self.order.id()
    }
}
