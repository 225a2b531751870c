//! In-process event bus for committed order events.
//!
//! Every subscriber owns an unbounded queue. [`EventBus::publish`] never
//! blocks and never awaits a subscriber: a slow consumer only grows its own
//! queue. All subscribers observe events in the same order, each exactly
//! once. Nothing is persisted; events published while nobody listens are
//! gone.

use std::sync::{Arc, Mutex, PoisonError};

use domain::OrderEvent;
use tokio::sync::mpsc;

struct Subscriber {
    name: &'static str,
    sender: mpsc::UnboundedSender<Arc<OrderEvent>>,
}

/// Fan-out bus. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and returns its queue.
    ///
    /// Only events published after this call are delivered to it.
    pub fn subscribe(&self, name: &'static str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().push(Subscriber { name, sender });
        tracing::debug!(subscriber = name, "event bus subscriber registered");
        Subscription { name, receiver }
    }

    /// Enqueues the event for every live subscriber.
    ///
    /// Subscribers whose [`Subscription`] was dropped are removed.
    pub fn publish(&self, event: OrderEvent) {
        let event = Arc::new(event);
        // One lock for the whole fan-out keeps a single global order
        let mut subscribers = self.lock();
        subscribers.retain(|subscriber| {
            let delivered = subscriber.sender.send(Arc::clone(&event)).is_ok();
            if !delivered {
                tracing::debug!(subscriber = subscriber.name, "dropping closed subscriber");
            }
            delivered
        });
        metrics::counter!("order_events_published_total", "kind" => event.kind.as_str())
            .increment(1);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A subscriber's queue of events.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    name: &'static str,
    receiver: mpsc::UnboundedReceiver<Arc<OrderEvent>>,
}

impl Subscription {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Waits for the next event. Returns `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<Arc<OrderEvent>> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<OrderEvent>> {
        self.receiver.try_recv().ok()
    }
}
