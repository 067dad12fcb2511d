//! Order placement, lookup and cancellation.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, UserId};
use domain::LineItem;
use saga::order::Order;
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<LineItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

/// POST /orders: persists a pending order and announces it.
#[tracing::instrument(skip(state, req), fields(user_id = %req.user_id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state
        .runtime
        .orders()
        .create_order(req.user_id, req.items)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.runtime.orders().list_all().await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    state
        .runtime
        .orders()
        .get_order(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))
}

/// GET /orders/user/{user_id}
#[tracing::instrument(skip(state))]
pub async fn by_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.runtime.orders().list_by_user(user_id).await?))
}

/// POST /orders/{id}/cancel: body `{"reason": "..."}` is optional.
#[tracing::instrument(skip(state, body))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<OrderId>,
    body: Bytes,
) -> Result<Json<Order>, ApiError> {
    let req = if body.is_empty() {
        CancelOrderRequest::default()
    } else {
        serde_json::from_slice::<CancelOrderRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid cancel request: {e}")))?
    };
    let order = state.runtime.orders().cancel_order(id, req.reason).await?;
    Ok(Json(order))
}
