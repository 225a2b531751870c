//! Read-through cache over an [`OrderRepository`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use domain::{Order, OrderEvent, OrderEventKind, OrderId};
use event_bus::Subscription;
use order_store::{OrderRepository, Result};
use tokio::sync::{Mutex, RwLock};

/// Cache settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheConfig {
    /// Entries older than this are reloaded from the repository.
    /// `None` keeps entries until an event replaces them.
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    order: Order,
    stored_at: Instant,
}

impl Entry {
    fn new(order: Order) -> Self {
        Self {
            order,
            stored_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Option<Duration>) -> bool {
        ttl.is_none_or(|ttl| self.stored_at.elapsed() < ttl)
    }
}

/// Read-through, replace-on-write order cache.
///
/// Kept coherent by its own event bus [`Subscription`]: `Created` and
/// `Updated` events replace the entry with the committed order, `Deleted`
/// replaces it with a tombstone (the deleted order). Entries only move
/// forward in version, so a slow repository load can never overwrite a
/// newer committed state or resurrect a deleted order.
///
/// Every read first applies all events already queued, so an event
/// published before a read is always visible to it.
pub struct OrderCache<R: OrderRepository> {
    repository: Arc<R>,
    entries: RwLock<HashMap<OrderId, Entry>>,
    events: Mutex<Subscription>,
    config: CacheConfig,
}

impl<R: OrderRepository> OrderCache<R> {
    /// Creates a cache reading through to `repository` and fed by `events`.
    pub fn new(repository: Arc<R>, events: Subscription, config: CacheConfig) -> Self {
        Self {
            repository,
            entries: RwLock::new(HashMap::new()),
            events: Mutex::new(events),
            config,
        }
    }

    /// Returns the order, loading it from the repository on a miss.
    ///
    /// A deleted order is returned as is (with `is_deleted` set); callers
    /// decide what a tombstone means to them.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        self.sync().await;

        if let Some(entry) = self.entries.read().await.get(&id)
            && entry.is_fresh(self.config.ttl)
        {
            metrics::counter!("order_cache_hits_total").increment(1);
            return Ok(Some(entry.order.clone()));
        }

        metrics::counter!("order_cache_misses_total").increment(1);
        let Some(loaded) = self.repository.find_by_id(id).await? else {
            tracing::debug!("order not in repository");
            return Ok(None);
        };

        let mut entries = self.entries.write().await;
        Ok(Some(store_if_newer(&mut entries, loaded, true).clone()))
    }

    /// Seeds the cache with orders read from the repository.
    pub async fn warm(&self, orders: &[Order]) {
        self.sync().await;
        let mut entries = self.entries.write().await;
        for order in orders {
            store_if_newer(&mut entries, order.clone(), false);
        }
    }

    /// Applies every event queued on the subscription.
    ///
    /// The subscription lock is held until the events are applied, so a
    /// concurrent reader that finds the queue empty still waits for them.
    pub async fn sync(&self) {
        let mut events = self.events.lock().await;
        let pending: Vec<Arc<OrderEvent>> = std::iter::from_fn(|| events.try_recv()).collect();
        if pending.is_empty() {
            return;
        }

        let mut entries = self.entries.write().await;
        for event in pending {
            apply_event(&mut entries, &event);
        }
    }

    /// Drops the entry for an order.
    pub async fn invalidate(&self, id: OrderId) {
        self.entries.write().await.remove(&id);
    }

    /// Number of cached entries, tombstones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

fn apply_event(entries: &mut HashMap<OrderId, Entry>, event: &OrderEvent) {
    if event.kind == OrderEventKind::Deleted {
        tracing::debug!(order_id = %event.order_id(), "caching tombstone");
    }
    store_if_newer(entries, event.order.clone(), true);
}

/// Stores `order` unless the cache already holds a newer version.
///
/// An equal version only replaces the entry when `refresh` is set, which
/// restarts its TTL. Returns the entry's order after the decision.
fn store_if_newer(
    entries: &mut HashMap<OrderId, Entry>,
    order: Order,
    refresh: bool,
) -> &Order {
    let id = order.id();
    let replace = match entries.get(&id) {
        Some(current) if current.order.version() > order.version() => false,
        Some(current) if current.order.version() == order.version() => refresh,
        _ => true,
    };
    if replace {
        entries.insert(id, Entry::new(order));
    }
    &entries[&id].order
}
