//! Domain layer for the order subsystem.
//!
//! This crate provides the order aggregate and everything that can be said
//! about it without I/O:
//! - [`Order`] with its customer snapshot, line items and derived totals
//! - [`recompute_totals`] and [`validate`], the two pure invariant functions
//! - commands describing create/update requests
//! - [`OrderEvent`], published after every committed mutation
//! - [`OrderDocument`], the persisted/wire shape of an order

pub mod error;
pub mod order;

pub use common::{OrderId, ProductId, UserId, Version};
pub use error::{DocumentError, ValidationError};
pub use order::{
    Address, ClienteDocument, CreateOrder, CustomerSnapshot, DireccionDocument, LineItem,
    LineItemChange, LineaPedidoDocument, Money, Order, OrderDocument, OrderEvent, OrderEventKind,
    UpdateOrder, recompute_totals, validate,
};
