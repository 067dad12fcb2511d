//! Invoice lookups.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{InvoiceId, OrderId, UserId};
use saga::billing::Invoice;

use super::AppState;
use crate::error::ApiError;

/// GET /invoices/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<InvoiceId>,
) -> Result<Json<Invoice>, ApiError> {
    state
        .runtime
        .billing()
        .get_invoice(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Invoice {id} not found")))
}

/// GET /invoices/order/{order_id}
#[tracing::instrument(skip(state))]
pub async fn by_order(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Invoice>, ApiError> {
    state
        .runtime
        .billing()
        .invoice_for_order(order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No invoice for order {order_id}")))
}

/// GET /invoices/user/{user_id}
#[tracing::instrument(skip(state))]
pub async fn by_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    Ok(Json(state.runtime.billing().invoices_for_user(user_id).await?))
}
