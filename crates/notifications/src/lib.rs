//! Real-time order notifications.
//!
//! The [`NotificationHub`] keeps the set of live sessions and pushes a
//! [`Notification`] frame to each of them for every committed order event.

pub mod hub;
pub mod message;

pub use hub::{DeliveryFailure, HubConfig, NotificationHub, Session, SessionId};
pub use message::Notification;
