//! Order use cases.
//!
//! [`OrderService`] is the only component that mutates orders. It keeps the
//! aggregate valid, relies on the repository's version check to serialize
//! concurrent writers, and publishes one event per committed mutation.

pub mod error;
pub mod service;

pub use error::{Result, ServiceError};
pub use service::{DELETE_ATTEMPTS, OrderService};
