//! Liveness endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use order_store::OrderRepository;
use serde::Serialize;

use super::orders::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Live WebSocket sessions.
    pub sessions: usize,
}

/// GET /health
pub async fn check<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.hub.session_count().await,
    })
}
