//! Payment lookups.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{OrderId, PaymentId, UserId};
use saga::payment::Payment;

use super::AppState;
use crate::error::ApiError;

/// GET /payments/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PaymentId>,
) -> Result<Json<Payment>, ApiError> {
    state
        .runtime
        .payments()
        .get_payment(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Payment {id} not found")))
}

/// GET /payments/order/{order_id}
#[tracing::instrument(skip(state))]
pub async fn by_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Payment>, ApiError> {
    state
        .runtime
        .payments()
        .payment_for_order(order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No payment for order {order_id}")))
}

/// GET /payments/user/{user_id}
#[tracing::instrument(skip(state))]
pub async fn by_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    Ok(Json(state.runtime.payments().payments_for_user(user_id).await?))
}
