//! Wire format of a notification.

use std::sync::Arc;

use domain::{OrderDocument, OrderEvent, OrderEventKind, Version};
use serde::{Deserialize, Serialize};

/// `{"type": "CREATED" | "UPDATED" | "DELETED", "version": n, "payload": <order document>}`
///
/// `version` is the order version the event committed. Events for one order
/// can reach a session out of order; clients keep the highest version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: OrderEventKind,
    pub version: Version,
    pub payload: OrderDocument,
}

impl From<&OrderEvent> for Notification {
    fn from(event: &OrderEvent) -> Self {
        Self {
            kind: event.kind,
            version: event.order.version(),
            payload: OrderDocument::from(&event.order),
        }
    }
}

impl Notification {
    /// Serializes the notification into a shareable text frame.
    pub fn encode(&self) -> Result<Arc<str>, serde_json::Error> {
        serde_json::to_string(self).map(Arc::from)
    }
}
