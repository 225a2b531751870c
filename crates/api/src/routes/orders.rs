//! Order CRUD endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{
    ClienteDocument, CreateOrder, LineItem, LineItemChange, LineaPedidoDocument, Order,
    OrderDocument, OrderId, ProductId, UpdateOrder, UserId, Version,
};
use notifications::NotificationHub;
use order_service::OrderService;
use order_store::{OrderRepository, Page};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R: OrderRepository> {
    pub order_service: OrderService<R>,
    pub hub: Arc<NotificationHub>,
    /// Ping interval for WebSocket sessions.
    pub heartbeat: Duration,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub id_usuario: i64,
    pub cliente: ClienteDocument,
    pub lineas_pedido: Vec<LineaPedidoDocument>,
}

/// Body of `PUT /orders/{id}`: the full new set of lines.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceLinesRequest {
    pub lineas_pedido: Vec<LineaPedidoDocument>,
    pub version: Option<i64>,
}

/// Body of `PATCH /orders/{id}`.
#[derive(Deserialize)]
pub struct ChangeLinesRequest {
    pub changes: Vec<ChangeRequest>,
    pub version: Option<i64>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ChangeRequest {
    Add(LineaPedidoDocument),
    Remove { id_producto: i64 },
    SetQuantity { id_producto: i64, cantidad: i64 },
    Replace { lineas_pedido: Vec<LineaPedidoDocument> },
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub include_deleted: bool,
    pub user_id: Option<i64>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

// -- Response types --

/// An order document together with the version to send back on update.
#[derive(Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub document: OrderDocument,
    pub version: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            document: OrderDocument::from(order),
            version: order.version().as_i64(),
        }
    }
}

// -- Handlers --

/// POST /orders — create a new order.
#[tracing::instrument(skip(state, req), fields(user_id = req.id_usuario))]
pub async fn create<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let cmd = CreateOrder::new(
        req.id_usuario,
        req.cliente.into(),
        to_line_items(req.lineas_pedido)?,
    );
    let order = state.order_service.create(cmd).await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders/{id} — load an active order.
#[tracing::instrument(skip(state))]
pub async fn get<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.order_service.get(parse_order_id(&id)?).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders — list orders, oldest first.
///
/// Without `page` or `size` every matching order is returned. `userId`
/// always pages and never includes deleted orders.
#[tracing::instrument(skip(state))]
pub async fn list<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let page = page_from(&query)?;
    let service = &state.order_service;

    let orders = match (query.user_id, page) {
        (Some(user_id), page) => {
            service
                .list_by_user(UserId::new(user_id), page.unwrap_or_default())
                .await?
        }
        (None, Some(page)) => service.list_page(query.include_deleted, page).await?,
        (None, None) => service.list(query.include_deleted).await?,
    };

    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// PUT /orders/{id} — replace every line of an order.
#[tracing::instrument(skip(state, req))]
pub async fn replace<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    Json(req): Json<ReplaceLinesRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let changes = vec![LineItemChange::Replace(to_line_items(req.lineas_pedido)?)];
    let cmd = update_command(parse_order_id(&id)?, changes, req.version);
    let order = state.order_service.update(cmd).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /orders/{id} — apply a list of line changes, all or nothing.
#[tracing::instrument(skip(state, req))]
pub async fn change<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
    Json(req): Json<ChangeLinesRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let changes = req
        .changes
        .into_iter()
        .map(to_change)
        .collect::<Result<Vec<_>, _>>()?;
    let order = state
        .order_service
        .update(update_command(order_id, changes, req.version))
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// DELETE /orders/{id} — soft-delete an order. Repeating it is a no-op.
#[tracing::instrument(skip(state))]
pub async fn delete<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.order_service.delete(parse_order_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

fn page_from(query: &ListQuery) -> Result<Option<Page>, ApiError> {
    if query.page.is_none() && query.size.is_none() {
        return Ok(None);
    }
    let size = query.size.unwrap_or(Page::DEFAULT_SIZE);
    if size == 0 {
        return Err(ApiError::BadRequest("Page size must be at least 1".to_string()));
    }
    Ok(Some(Page::new(query.page.unwrap_or(0), size)))
}

fn to_line_items(lines: Vec<LineaPedidoDocument>) -> Result<Vec<LineItem>, ApiError> {
    lines
        .into_iter()
        .map(|line| LineItem::try_from(line).map_err(ApiError::from))
        .collect()
}

fn to_change(change: ChangeRequest) -> Result<LineItemChange, ApiError> {
    Ok(match change {
        ChangeRequest::Add(line) => LineItemChange::Add(LineItem::try_from(line)?),
        ChangeRequest::Remove { id_producto } => LineItemChange::Remove {
            product_id: ProductId::new(id_producto),
        },
        ChangeRequest::SetQuantity {
            id_producto,
            cantidad,
        } => LineItemChange::SetQuantity {
            product_id: ProductId::new(id_producto),
            quantity: u32::try_from(cantidad).map_err(|_| {
                ApiError::BadRequest(format!(
                    "Invalid quantity {cantidad} for product {id_producto}"
                ))
            })?,
        },
        ChangeRequest::Replace { lineas_pedido } => {
            LineItemChange::Replace(to_line_items(lineas_pedido)?)
        }
    })
}

fn update_command(
    order_id: OrderId,
    changes: Vec<LineItemChange>,
    version: Option<i64>,
) -> UpdateOrder {
    let cmd = UpdateOrder::new(order_id, changes);
    match version {
        Some(version) => cmd.expecting(Version::new(version)),
        None => cmd,
    }
}
