//! HTTP and WebSocket server for the order subsystem.
//!
//! Provides REST endpoints for order management and a WebSocket stream of
//! order changes, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use event_bus::EventBus;
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::NotificationHub;
use order_service::OrderService;
use order_store::OrderRepository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: OrderRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<R>))
        .route(
            "/orders",
            get(routes::orders::list::<R>).post(routes::orders::create::<R>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<R>)
                .put(routes::orders::replace::<R>)
                .patch(routes::orders::change::<R>)
                .delete(routes::orders::delete::<R>),
        )
        .route("/ws/orders", get(routes::ws::subscribe::<R>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the service, cache and notification hub around `repository`.
///
/// Spawns the hub's broadcast loop, so it must be called inside a Tokio
/// runtime.
pub fn create_state<R: OrderRepository + 'static>(
    repository: R,
    config: &Config,
) -> Arc<AppState<R>> {
    let bus = EventBus::new();
    let hub = Arc::new(NotificationHub::new(config.hub_config()));
    tokio::spawn(Arc::clone(&hub).run(bus.subscribe("notifications")));

    let order_service =
        OrderService::with_cache(Arc::new(repository), bus, config.cache_config());

    Arc::new(AppState {
        order_service,
        hub,
        heartbeat: config.ws_heartbeat,
    })
}
