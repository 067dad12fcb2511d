//! Product catalog and stock lookups.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::ProductId;
use saga::inventory::{NewProduct, Product};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub product_id: ProductId,
    pub quantity: u32,
    pub available: bool,
}

/// POST /inventory/products
#[tracing::instrument(skip(state, product), fields(name = %product.name))]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.runtime.inventory().register_product(product).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /inventory/products
#[tracing::instrument(skip(state))]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.runtime.inventory().list_products().await?))
}

/// GET /inventory/products/available: products with free stock.
#[tracing::instrument(skip(state))]
pub async fn available_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.runtime.inventory().list_available_products().await?))
}

/// GET /inventory/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, ApiError> {
    state
        .runtime
        .inventory()
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))
}

/// GET /inventory/products/{id}/availability?quantity=n
#[tracing::instrument(skip(state))]
pub async fn availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProductId>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let available = state
        .runtime
        .inventory()
        .check_availability(id, query.quantity)
        .await?;
    Ok(Json(AvailabilityResponse {
        product_id: id,
        quantity: query.quantity,
        available,
    }))
}
