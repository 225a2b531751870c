//! Integration tests for the order service.
//!
//! These tests wire the service the way the server does: an in-memory
//! repository, one event bus, the read cache and a notification hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use domain::{
    Address, CreateOrder, CustomerSnapshot, LineItem, LineItemChange, Money, Order,
    OrderEventKind, OrderId, ProductId, UpdateOrder, UserId, ValidationError, Version,
};
use event_bus::EventBus;
use notifications::{Notification, NotificationHub};
use order_cache::CacheConfig;
use order_service::{DELETE_ATTEMPTS, OrderService, ServiceError};
use order_store::{InMemoryOrderRepository, OrderQuery, OrderRepository, Page, Result};
use tokio::sync::Barrier;

fn customer() -> CustomerSnapshot {
    CustomerSnapshot {
        full_name: "Juan Perez".to_string(),
        email: "juanperez@gmail.com".to_string(),
        phone: "+34123456789".to_string(),
        address: Address {
            street: "Calle Mayor".to_string(),
            number: "10".to_string(),
            city: "Madrid".to_string(),
            province: "Madrid".to_string(),
            country: "España".to_string(),
            postal_code: "28001".to_string(),
        },
    }
}

fn sample_create(user_id: i64) -> CreateOrder {
    CreateOrder::new(
        user_id,
        customer(),
        vec![
            LineItem::new(2, Money::from_cents(1999), 1),
            LineItem::new(3, Money::from_cents(1599), 2),
        ],
    )
}

/// Helper to create a service over a fresh in-memory repository
fn create_service() -> OrderService<InMemoryOrderRepository> {
    OrderService::with_cache(
        Arc::new(InMemoryOrderRepository::new()),
        EventBus::new(),
        CacheConfig::default(),
    )
}

mod create {
    use super::*;

    #[tokio::test]
    async fn computes_totals_and_persists() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();

        assert_eq!(order.total().to_string(), "51.97");
        assert_eq!(order.total_items(), 3);
        assert_eq!(order.version(), Version::first());
        assert!(!order.is_deleted());
        assert_eq!(order.created_at(), order.updated_at());

        let stored = service
            .repository()
            .find_by_id(order.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, order);
    }

    #[tokio::test]
    async fn empty_order_is_rejected_and_nothing_is_written() {
        let service = create_service();
        let mut events = service.bus().subscribe("test");

        let result = service
            .create(CreateOrder::new(1, customer(), vec![]))
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Validation(ValidationError::EmptyLineItems))
        ));
        assert!(service.repository().is_empty().await);
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn invalid_customer_is_rejected() {
        let service = create_service();
        let mut c = customer();
        c.email = "not-an-email".to_string();

        let result = service
            .create(CreateOrder::new(
                1,
                c,
                vec![LineItem::new(1, Money::from_cents(100), 1)],
            ))
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Validation(ValidationError::InvalidCustomer {
                field: "email",
                ..
            }))
        ));
        assert!(service.repository().is_empty().await);
    }

    #[tokio::test]
    async fn publishes_exactly_one_created_event() {
        let service = create_service();
        let mut events = service.bus().subscribe("test");

        let order = service.create(sample_create(1)).await.unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, OrderEventKind::Created);
        assert_eq!(event.order, order);
        assert!(events.try_recv().is_none());
    }
}

mod update {
    use super::*;

    #[tokio::test]
    async fn recomputes_totals_and_bumps_version() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();

        let updated = service
            .update(UpdateOrder::new(
                order.id(),
                vec![
                    LineItemChange::Add(LineItem::new(2, Money::from_cents(5000), 1)),
                    LineItemChange::Remove {
                        product_id: ProductId::new(3),
                    },
                ],
            ))
            .await
            .unwrap();

        assert_eq!(updated.version(), Version::new(2));
        assert_eq!(updated.total().cents(), 1999 * 2);
        assert_eq!(updated.total_items(), 2);
        assert!(updated.updated_at() >= order.updated_at());
        assert_eq!(updated.created_at(), order.created_at());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let service = create_service();
        let id = OrderId::new();
        let result = service.update(UpdateOrder::new(id, vec![])).await;
        assert!(matches!(result, Err(ServiceError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn invalid_change_leaves_the_order_untouched() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();
        let mut events = service.bus().subscribe("test");

        let result = service
            .update(UpdateOrder::new(
                order.id(),
                vec![LineItemChange::SetQuantity {
                    product_id: ProductId::new(99),
                    quantity: 1,
                }],
            ))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Validation(ValidationError::LineItemNotFound { .. }))
        ));

        let result = service
            .update(UpdateOrder::new(
                order.id(),
                vec![LineItemChange::Replace(vec![])],
            ))
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Validation(ValidationError::EmptyLineItems))
        ));

        assert_eq!(service.get(order.id()).await.unwrap(), order);
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();
        service
            .update(UpdateOrder::new(
                order.id(),
                vec![LineItemChange::SetQuantity {
                    product_id: ProductId::new(2),
                    quantity: 2,
                }],
            ))
            .await
            .unwrap();

        let result = service
            .update(UpdateOrder::new(order.id(), vec![]).expecting(order.version()))
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::Conflict { expected, actual, .. })
                if expected == Version::first() && actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn deleted_order_cannot_be_updated() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();
        service.delete(order.id()).await.unwrap();

        let result = service
            .update(UpdateOrder::new(
                order.id(),
                vec![LineItemChange::Add(LineItem::new(
                    9,
                    Money::from_cents(1),
                    1,
                ))],
            ))
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn deleted_order_is_not_found() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();
        // Prime the cache so the tombstone path is exercised
        service.get(order.id()).await.unwrap();

        service.delete(order.id()).await.unwrap();

        assert!(matches!(
            service.get(order.id()).await,
            Err(ServiceError::NotFound(_))
        ));
        let stored = service
            .repository()
            .find_by_id(order.id())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_deleted());
        assert!(stored.updated_at() >= order.updated_at());
    }

    #[tokio::test]
    async fn second_delete_is_a_no_op() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();
        service.delete(order.id()).await.unwrap();

        let after_first = service
            .repository()
            .find_by_id(order.id())
            .await
            .unwrap()
            .unwrap();
        let mut events = service.bus().subscribe("test");

        tokio::time::sleep(Duration::from_millis(5)).await;
        service.delete(order.id()).await.unwrap();

        let after_second = service
            .repository()
            .find_by_id(order.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_second.updated_at(), after_first.updated_at());
        assert_eq!(after_second.version(), after_first.version());
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let service = create_service();
        assert!(matches!(
            service.delete(OrderId::new()).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn list_hides_deleted_orders_unless_asked() {
        let service = create_service();
        let kept = service.create(sample_create(1)).await.unwrap();
        let gone = service.create(sample_create(1)).await.unwrap();
        service.delete(gone.id()).await.unwrap();

        let active = service.list(false).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), kept.id());

        let all = service.list(true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn list_by_user_pages_through_active_orders() {
        let service = create_service();
        for _ in 0..3 {
            service.create(sample_create(5)).await.unwrap();
        }
        service.create(sample_create(6)).await.unwrap();

        let first = service
            .list_by_user(UserId::new(5), Page::new(0, 2))
            .await
            .unwrap();
        let second = service
            .list_by_user(UserId::new(5), Page::new(1, 2))
            .await
            .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
        assert!(first.iter().chain(&second).all(|o| o.user_id() == UserId::new(5)));

        let page = service.list_page(false, Page::new(0, 10)).await.unwrap();
        assert_eq!(page.len(), 4);
    }

    #[tokio::test]
    async fn list_warms_the_cache() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();
        service.cache().clear().await;

        service.list(false).await.unwrap();
        assert_eq!(service.cache().len().await, 1);
        assert_eq!(service.get(order.id()).await.unwrap(), order);
    }

    #[tokio::test]
    async fn get_after_update_is_never_stale() {
        let service = create_service();
        let order = service.create(sample_create(1)).await.unwrap();

        for quantity in 2..6 {
            // Read first so the cache holds the previous version
            service.get(order.id()).await.unwrap();
            let updated = service
                .update(UpdateOrder::new(
                    order.id(),
                    vec![LineItemChange::SetQuantity {
                        product_id: ProductId::new(2),
                        quantity,
                    }],
                ))
                .await
                .unwrap();
            assert_eq!(service.get(order.id()).await.unwrap(), updated);
        }
    }
}

/// Repository whose loads wait until every racing task has loaded.
struct BarrierRepository {
    inner: InMemoryOrderRepository,
    barrier: Barrier,
}

#[async_trait]
impl OrderRepository for BarrierRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let order = self.inner.find_by_id(id).await?;
        self.barrier.wait().await;
        Ok(order)
    }

    async fn find(&self, query: OrderQuery) -> Result<Vec<Order>> {
        self.inner.find(query).await
    }

    async fn save(&self, order: &Order) -> Result<Order> {
        self.inner.save(order).await
    }

    async fn exists_by_id(&self, id: OrderId) -> Result<bool> {
        self.inner.exists_by_id(id).await
    }
}

/// Repository where another writer bumps the order right before each of the
/// first `races` delete writes lands.
struct RacingRepository {
    inner: InMemoryOrderRepository,
    races: usize,
    raced: AtomicUsize,
}

impl RacingRepository {
    fn new(inner: InMemoryOrderRepository, races: usize) -> Self {
        Self {
            inner,
            races,
            raced: AtomicUsize::new(0),
        }
    }

    async fn concurrent_update(&self, id: OrderId) -> Result<()> {
        if let Some(mut current) = self.inner.find_by_id(id).await? {
            let quantity = current.line_items()[0].quantity + 1;
            current
                .apply_changes(&[LineItemChange::SetQuantity {
                    product_id: ProductId::new(2),
                    quantity,
                }])
                .unwrap();
            self.inner.save(&current).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for RacingRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        self.inner.find_by_id(id).await
    }

    async fn find(&self, query: OrderQuery) -> Result<Vec<Order>> {
        self.inner.find(query).await
    }

    async fn save(&self, order: &Order) -> Result<Order> {
        if order.is_deleted() && self.raced.fetch_add(1, Ordering::SeqCst) < self.races {
            self.concurrent_update(order.id()).await?;
        }
        self.inner.save(order).await
    }

    async fn exists_by_id(&self, id: OrderId) -> Result<bool> {
        self.inner.exists_by_id(id).await
    }
}

fn seeded_order() -> Order {
    Order::new(
        OrderId::new(),
        UserId::new(1),
        customer(),
        vec![LineItem::new(2, Money::from_cents(1999), 1)],
        chrono::Utc::now(),
    )
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_updates_from_the_same_version_have_one_winner() {
        let inner = InMemoryOrderRepository::new();
        let seeded = inner.save(&seeded_order()).await.unwrap();

        let repository = Arc::new(BarrierRepository {
            inner,
            barrier: Barrier::new(2),
        });
        let service = Arc::new(OrderService::with_cache(
            repository,
            EventBus::new(),
            CacheConfig::default(),
        ));
        let mut events = service.bus().subscribe("test");

        let tasks: Vec<_> = [5, 7]
            .into_iter()
            .map(|quantity| {
                let service = Arc::clone(&service);
                let id = seeded.id();
                tokio::spawn(async move {
                    service
                        .update(UpdateOrder::new(
                            id,
                            vec![LineItemChange::SetQuantity {
                                product_id: ProductId::new(2),
                                quantity,
                            }],
                        ))
                        .await
                })
            })
            .collect();

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::Conflict { .. })))
            .count();
        assert_eq!(winners.len(), 1);
        assert_eq!(conflicts, 1);
        assert_eq!(winners[0].version(), Version::new(2));

        // The stored order is the winner's, totals included
        let stored = service
            .repository()
            .find_by_id(seeded.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version(), winners[0].version());
        assert_eq!(stored.total_items(), winners[0].total_items());
        assert_eq!(stored.total(), winners[0].total());
        assert_eq!(stored.line_items(), winners[0].line_items());

        // Only the winner published
        let event = events.try_recv().unwrap();
        assert_eq!(event.order.version(), Version::new(2));
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn delete_racing_an_update_reloads_and_deletes() {
        let inner = InMemoryOrderRepository::new();
        let seeded = inner.save(&seeded_order()).await.unwrap();
        let service = OrderService::with_cache(
            Arc::new(RacingRepository::new(inner, 1)),
            EventBus::new(),
            CacheConfig::default(),
        );
        let mut events = service.bus().subscribe("test");

        service.delete(seeded.id()).await.unwrap();

        let stored = service
            .repository()
            .find_by_id(seeded.id())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_deleted());
        assert_eq!(stored.version(), Version::new(3));
        // The concurrent update is kept, not overwritten
        assert_eq!(stored.total_items(), 2);
        assert!(matches!(
            service.get(seeded.id()).await,
            Err(ServiceError::NotFound(_))
        ));

        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, OrderEventKind::Deleted);
        assert_eq!(event.order.version(), Version::new(3));
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn delete_gives_up_after_repeated_races() {
        let inner = InMemoryOrderRepository::new();
        let seeded = inner.save(&seeded_order()).await.unwrap();
        let service = OrderService::with_cache(
            Arc::new(RacingRepository::new(inner, DELETE_ATTEMPTS)),
            EventBus::new(),
            CacheConfig::default(),
        );
        let mut events = service.bus().subscribe("test");

        assert!(matches!(
            service.delete(seeded.id()).await,
            Err(ServiceError::Conflict { .. })
        ));

        let stored = service
            .repository()
            .find_by_id(seeded.id())
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_deleted());
        assert!(events.try_recv().is_none());
    }
}

mod notifications_end_to_end {
    use super::*;

    #[tokio::test]
    async fn created_order_is_broadcast_to_sessions() {
        let service = create_service();
        let hub = Arc::new(NotificationHub::default());
        let (session, mut frames) = hub.open_session();
        hub.register(session).await;
        tokio::spawn(Arc::clone(&hub).run(service.bus().subscribe("notifications")));

        let order = service.create(sample_create(1)).await.unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(5), frames.recv())
            .await
            .unwrap()
            .unwrap();
        let notification: Notification = serde_json::from_str(&frame).unwrap();
        assert_eq!(notification.kind, OrderEventKind::Created);
        assert_eq!(notification.version, order.version());
        assert_eq!(notification.payload.id, order.id());
        assert_eq!(notification.payload.total, 51.97);
        assert_eq!(notification.payload.total_items, 3);

        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "CREATED");
    }
}
