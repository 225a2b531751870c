//! Order service providing the use cases over the order aggregate.

use std::sync::Arc;

use chrono::Utc;
use domain::{CreateOrder, Order, OrderEvent, OrderId, UpdateOrder, UserId, Version, validate};
use event_bus::EventBus;
use order_cache::{CacheConfig, OrderCache};
use order_store::{OrderQuery, OrderRepository, Page, StoreError};

use crate::error::{Result, ServiceError};

/// Times `delete` writes before giving up on a contended order.
pub const DELETE_ATTEMPTS: usize = 3;

/// Service for managing orders.
///
/// Every mutation follows the same path: load (for updates), mutate,
/// recompute, validate, persist with a version check, then publish exactly
/// one event. Nothing is written or published if any step fails, and the
/// event is only published once the repository has acknowledged the write.
pub struct OrderService<R: OrderRepository> {
    repository: Arc<R>,
    cache: Arc<OrderCache<R>>,
    bus: EventBus,
}

impl<R: OrderRepository> OrderService<R> {
    /// Creates a service from already wired collaborators.
    pub fn new(repository: Arc<R>, cache: Arc<OrderCache<R>>, bus: EventBus) -> Self {
        Self {
            repository,
            cache,
            bus,
        }
    }

    /// Creates a service with its own cache subscribed to `bus`.
    pub fn with_cache(repository: Arc<R>, bus: EventBus, cache_config: CacheConfig) -> Self {
        let cache = OrderCache::new(
            Arc::clone(&repository),
            bus.subscribe("order-cache"),
            cache_config,
        );
        Self::new(repository, Arc::new(cache), bus)
    }

    /// Returns the underlying repository.
    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Returns the read cache.
    pub fn cache(&self) -> &Arc<OrderCache<R>> {
        &self.cache
    }

    /// Returns the bus events are published on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Creates a new order.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id))]
    pub async fn create(&self, cmd: CreateOrder) -> Result<Order> {
        let order = Order::new(
            OrderId::new(),
            cmd.user_id,
            cmd.customer,
            cmd.line_items,
            Utc::now(),
        );
        check(&order)?;

        let saved = self.repository.save(&order).await.map_err(store_error)?;
        self.bus.publish(OrderEvent::created(saved.clone()));

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %saved.id(), total = %saved.total(), "order created");
        Ok(saved)
    }

    /// Applies line item changes to an existing order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn update(&self, cmd: UpdateOrder) -> Result<Order> {
        let mut order = self.load_active(cmd.order_id).await?;

        if let Some(expected) = cmd.expected_version
            && expected != order.version()
        {
            return Err(conflict(cmd.order_id, expected, order.version()));
        }

        if let Err(err) = order.apply_changes(&cmd.changes) {
            metrics::counter!("order_validation_failures_total").increment(1);
            return Err(err.into());
        }
        check(&order)?;
        order.touch(Utc::now());

        let saved = self.repository.save(&order).await.map_err(store_error)?;
        self.bus.publish(OrderEvent::updated(saved.clone()));

        metrics::counter!("orders_updated_total").increment(1);
        tracing::info!(version = %saved.version(), total = %saved.total(), "order updated");
        Ok(saved)
    }

    /// Soft-deletes an order.
    ///
    /// Deleting an order that is already deleted succeeds without writing
    /// or publishing anything. A write that loses a version race reloads
    /// the order and tries again, up to [`DELETE_ATTEMPTS`] times.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<()> {
        let mut attempt = 1;
        loop {
            let Some(mut order) = self.repository.find_by_id(id).await? else {
                return Err(ServiceError::NotFound(id));
            };

            if !order.mark_deleted(Utc::now()) {
                tracing::debug!(attempt, "order already deleted");
                return Ok(());
            }

            match self.repository.save(&order).await {
                Ok(saved) => {
                    self.bus.publish(OrderEvent::deleted(saved));
                    metrics::counter!("orders_deleted_total").increment(1);
                    tracing::info!("order deleted");
                    return Ok(());
                }
                Err(StoreError::ConcurrencyConflict { actual, .. })
                    if attempt < DELETE_ATTEMPTS =>
                {
                    tracing::debug!(attempt, %actual, "order changed during delete, reloading");
                    attempt += 1;
                }
                Err(err) => return Err(store_error(err)),
            }
        }
    }

    /// Returns an active order, served from the cache when possible.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        match self.cache.get(id).await? {
            Some(order) if !order.is_deleted() => Ok(order),
            _ => Err(ServiceError::NotFound(id)),
        }
    }

    /// Returns every order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, include_deleted: bool) -> Result<Vec<Order>> {
        self.query(OrderQuery::new().include_deleted(include_deleted))
            .await
    }

    /// Returns one page of orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_page(&self, include_deleted: bool, page: Page) -> Result<Vec<Order>> {
        self.query(OrderQuery::new().include_deleted(include_deleted).page(page))
            .await
    }

    /// Returns one page of a user's active orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Order>> {
        self.query(OrderQuery::for_user(user_id).page(page)).await
    }

    async fn query(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let orders = self.repository.find(query).await?;
        self.cache.warm(&orders).await;
        Ok(orders)
    }

    /// Loads the authoritative state of an order that is not deleted.
    async fn load_active(&self, id: OrderId) -> Result<Order> {
        match self.repository.find_by_id(id).await? {
            Some(order) if !order.is_deleted() => Ok(order),
            _ => Err(ServiceError::NotFound(id)),
        }
    }
}

fn check(order: &Order) -> Result<()> {
    validate(order).map_err(|err| {
        metrics::counter!("order_validation_failures_total").increment(1);
        tracing::debug!(error = %err, "order rejected");
        ServiceError::from(err)
    })
}

fn conflict(order_id: OrderId, expected: Version, actual: Version) -> ServiceError {
    metrics::counter!("order_conflicts_total").increment(1);
    tracing::warn!(%order_id, %expected, %actual, "order version conflict");
    ServiceError::Conflict {
        order_id,
        expected,
        actual,
    }
}

fn store_error(err: StoreError) -> ServiceError {
    match err {
        StoreError::ConcurrencyConflict {
            order_id,
            expected,
            actual,
        } => conflict(order_id, expected, actual),
        other => ServiceError::Store(other),
    }
}
