use async_trait::async_trait;
use domain::Order;

use crate::{OrderId, OrderQuery, Result, Version};

/// Authoritative storage for orders.
///
/// Orders are stored whole, as documents, next to a version number used
/// for optimistic concurrency control. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Loads an order by id, including soft-deleted ones.
    ///
    /// The returned order carries its stored version.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads the orders matching a query, oldest first.
    async fn find(&self, query: OrderQuery) -> Result<Vec<Order>>;

    /// Inserts or replaces an order.
    ///
    /// `order.version()` must equal the stored version
    /// (`Version::initial()` for an order that does not exist yet),
    /// otherwise the write is rejected with `ConcurrencyConflict` and
    /// nothing changes. Returns the order carrying its new version.
    async fn save(&self, order: &Order) -> Result<Order>;

    /// Returns true if an order with this id exists, deleted or not.
    async fn exists_by_id(&self, id: OrderId) -> Result<bool>;
}

/// Extension trait providing convenience methods for order repositories.
#[async_trait]
pub trait OrderRepositoryExt: OrderRepository {
    /// Loads every order that is not soft-deleted.
    async fn find_all_active(&self) -> Result<Vec<Order>> {
        self.find(OrderQuery::new()).await
    }

    /// Loads every order, optionally including soft-deleted ones.
    async fn find_all(&self, include_deleted: bool) -> Result<Vec<Order>> {
        self.find(OrderQuery::new().include_deleted(include_deleted))
            .await
    }

    /// Returns the stored version of an order, if it exists.
    async fn current_version(&self, id: OrderId) -> Result<Option<Version>> {
        Ok(self.find_by_id(id).await?.map(|o| o.version()))
    }
}

// Blanket implementation for all OrderRepository implementations
impl<T: OrderRepository + ?Sized> OrderRepositoryExt for T {}
