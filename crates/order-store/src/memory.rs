use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{Order, OrderDocument};
use tokio::sync::RwLock;

use crate::{OrderId, OrderQuery, OrderRepository, Result, StoreError, Version};

#[derive(Debug, Clone)]
struct StoredOrder {
    version: Version,
    document: OrderDocument,
}

impl StoredOrder {
    fn to_order(&self) -> Result<Order> {
        let order = Order::try_from(self.document.clone())?;
        Ok(order.with_version(self.version))
    }
}

/// In-memory order repository.
///
/// Keeps the same document form and version semantics as the PostgreSQL
/// implementation. Used when no database is configured and in tests.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, StoredOrder>>>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-loaded with documents, each at version 1.
    pub fn with_documents(documents: impl IntoIterator<Item = OrderDocument>) -> Self {
        let orders = documents
            .into_iter()
            .map(|document| {
                (
                    document.id,
                    StoredOrder {
                        version: Version::first(),
                        document,
                    },
                )
            })
            .collect();
        Self {
            orders: Arc::new(RwLock::new(orders)),
        }
    }

    /// Returns the total number of stored orders, deleted ones included.
    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.orders.read().await.is_empty()
    }

    /// Removes every order.
    pub async fn clear(&self) {
        self.orders.write().await.clear();
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        orders.get(&id).map(StoredOrder::to_order).transpose()
    }

    async fn find(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<&StoredOrder> = orders
            .values()
            .filter(|stored| {
                if !query.include_deleted && stored.document.is_deleted {
                    return false;
                }
                if let Some(user_id) = query.user_id
                    && stored.document.id_usuario != user_id.as_i64()
                {
                    return false;
                }
                true
            })
            .collect();

        // Sort by creation time then id
        matching.sort_by(|a, b| {
            a.document
                .created_at
                .cmp(&b.document.created_at)
                .then(a.document.id.cmp(&b.document.id))
        });

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(StoredOrder::to_order)
            .collect()
    }

    async fn save(&self, order: &Order) -> Result<Order> {
        let order_id = order.id();
        let mut orders = self.orders.write().await;

        let actual = orders
            .get(&order_id)
            .map(|stored| stored.version)
            .unwrap_or(Version::initial());

        if actual != order.version() {
            return Err(StoreError::ConcurrencyConflict {
                order_id,
                expected: order.version(),
                actual,
            });
        }

        let version = actual.next();
        orders.insert(
            order_id,
            StoredOrder {
                version,
                document: OrderDocument::from(order),
            },
        );

        Ok(order.clone().with_version(version))
    }

    async fn exists_by_id(&self, id: OrderId) -> Result<bool> {
        Ok(self.orders.read().await.contains_key(&id))
    }
}
