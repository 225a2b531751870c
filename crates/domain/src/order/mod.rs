//! Order aggregate and related types.

mod aggregate;
mod commands;
mod document;
mod events;
mod value_objects;

pub use aggregate::{Order, recompute_totals, validate};
pub use commands::{CreateOrder, LineItemChange, UpdateOrder};
pub use document::{ClienteDocument, DireccionDocument, LineaPedidoDocument, OrderDocument};
pub use events::{OrderEvent, OrderEventKind};
pub use value_objects::{Address, CustomerSnapshot, LineItem, Money};
