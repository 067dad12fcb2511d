//! HTTP surface for the order fulfillment saga.
//!
//! The router only reads participant state and creates or cancels orders;
//! everything else happens on the bus. Structured logging comes from
//! `tracing` and metrics are exported in Prometheus format.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use common::Money;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::inventory::NewProduct;
use saga::{SagaConfig, SagaError, SagaRuntime};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create).get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/orders/user/{user_id}", get(routes::orders::by_user))
        .route(
            "/inventory/products",
            post(routes::inventory::create_product).get(routes::inventory::list_products),
        )
        .route(
            "/inventory/products/available",
            get(routes::inventory::available_products),
        )
        .route("/inventory/products/{id}", get(routes::inventory::get_product))
        .route(
            "/inventory/products/{id}/availability",
            get(routes::inventory::availability),
        )
        .route("/payments/{id}", get(routes::payments::get))
        .route("/payments/order/{order_id}", get(routes::payments::by_order))
        .route("/payments/user/{user_id}", get(routes::payments::by_user))
        .route("/invoices/{id}", get(routes::invoices::get))
        .route("/invoices/order/{order_id}", get(routes::invoices::by_order))
        .route("/invoices/user/{user_id}", get(routes::invoices::by_user))
        .route(
            "/notifications/user/{user_id}",
            get(routes::notifications::by_user),
        )
        .route("/dead-letters", get(routes::dead_letters::list))
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

/// Starts the saga runtime and wraps it as router state.
pub async fn create_default_state(config: SagaConfig) -> Result<Arc<AppState>, SagaError> {
    let runtime = SagaRuntime::start(config).await?;
    Ok(Arc::new(AppState {
        runtime: Arc::new(runtime),
    }))
}

/// Registers a small demo catalog. Products that already exist are skipped.
pub async fn seed_catalog(runtime: &SagaRuntime) -> Result<usize, SagaError> {
    let catalog = [
        ("Laptop", 129_999, 25),
        ("Wireless Mouse", 2_499, 200),
        ("Mechanical Keyboard", 8_999, 80),
        ("USB-C Hub", 3_999, 150),
        ("27\" Monitor", 32_999, 40),
    ];

    let mut registered = 0;
    for (name, cents, stock) in catalog {
        match runtime
            .inventory()
            .register_product(NewProduct::new(name, Money::from_cents(cents), stock))
            .await
        {
            Ok(product) => {
                tracing::debug!(product_id = %product.id, name, "seeded product");
                registered += 1;
            }
            Err(SagaError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(registered)
}
