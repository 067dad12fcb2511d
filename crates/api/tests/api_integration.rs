//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use event_bus::RetryPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use saga::SagaConfig;
use saga::payment::ApprovalRule;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn fast_config(rule: ApprovalRule) -> SagaConfig {
    SagaConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            multiplier: 2,
        },
        gateway_timeout: Duration::from_millis(500),
        channel_timeout: Duration::from_millis(500),
        approval_rule: rule,
        ..SagaConfig::default()
    }
}

async fn setup_with(rule: ApprovalRule) -> (axum::Router, Arc<AppState>) {
    let state = api::create_default_state(fast_config(rule)).await.unwrap();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn setup() -> (axum::Router, Arc<AppState>) {
    setup_with(ApprovalRule::AlwaysApprove).await
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create_product(app: &axum::Router, name: &str, price: i64, stock: u32) -> i64 {
    let (status, product) = send(
        app,
        "POST",
        "/inventory/products",
        Some(json!({ "name": name, "price": price, "stockQuantity": stock })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    product["id"].as_i64().unwrap()
}

async fn place_order(app: &axum::Router, user_id: i64, product_id: i64, quantity: u32) -> Value {
    let (status, order) = send(
        app,
        "POST",
        "/orders",
        Some(json!({
            "userId": user_id,
            "items": [{ "productId": product_id, "quantity": quantity, "unitPrice": 1000 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    order
}

async fn settle(state: &AppState) {
    assert!(state.runtime.wait_until_idle(Duration::from_secs(10)).await);
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["deadLetters"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_order_runs_through_the_saga() {
    let (app, state) = setup().await;
    let product_id = create_product(&app, "Widget", 1000, 10).await;

    let order = place_order(&app, 42, product_id, 2).await;
    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["totalAmount"], 2000);
    let order_id = order["id"].as_i64().unwrap();

    settle(&state).await;

    let (status, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CONFIRMED");

    let (status, payment) = send(&app, "GET", &format!("/payments/order/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "COMPLETED");
    assert_eq!(payment["amount"], 2000);

    let (status, invoice) = send(&app, "GET", &format!("/invoices/order/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoice["taxAmount"], 200);
    assert_eq!(invoice["totalAmount"], 2200);
    assert!(invoice["invoiceNumber"].as_str().unwrap().starts_with("INV-"));

    let payment_id = payment["id"].as_i64().unwrap();
    let (status, by_id) = send(&app, "GET", &format!("/payments/{payment_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["orderId"], order_id);
    let invoice_id = invoice["id"].as_i64().unwrap();
    let (status, by_id) = send(&app, "GET", &format!("/invoices/{invoice_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["invoiceNumber"], invoice["invoiceNumber"]);

    let (_, notifications) = send(&app, "GET", "/notifications/user/42", None).await;
    assert_eq!(notifications.as_array().unwrap().len(), 2);

    let (_, product) = send(&app, "GET", &format!("/inventory/products/{product_id}"), None).await;
    assert_eq!(product["stockQuantity"], 8);
    assert_eq!(product["reservedQuantity"], 0);

    let (_, by_user) = send(&app, "GET", "/orders/user/42", None).await;
    assert_eq!(by_user.as_array().unwrap().len(), 1);
    let (_, payments) = send(&app, "GET", "/payments/user/42", None).await;
    assert_eq!(payments.as_array().unwrap().len(), 1);
    let (_, invoices) = send(&app, "GET", "/invoices/user/42", None).await;
    assert_eq!(invoices.as_array().unwrap().len(), 1);

    state.runtime.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_declined_payment_fails_order() {
    let (app, state) = setup_with(ApprovalRule::AlwaysDecline).await;
    let product_id = create_product(&app, "Widget", 1000, 10).await;
    let order_id = place_order(&app, 7, product_id, 1).await["id"].as_i64().unwrap();

    settle(&state).await;

    let (_, order) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(order["status"], "FAILED");
    assert!(
        order["failureReason"]
            .as_str()
            .unwrap()
            .starts_with("Payment failed")
    );
    let (status, _) = send(&app, "GET", &format!("/invoices/order/{order_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    state.runtime.shutdown().await;
}

#[tokio::test]
async fn test_create_order_without_items_is_rejected() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "POST", "/orders", Some(json!({ "userId": 1, "items": [] }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("at least one item"));
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/orders/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Order 999 not found");
}

#[tokio::test]
async fn test_unknown_payment_and_invoice_ids() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/payments/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Payment 77 not found");

    let (status, json) = send(&app, "GET", "/invoices/78", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Invoice 78 not found");
}

#[tokio::test]
async fn test_order_total_overflow_is_rejected() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "userId": 1,
            "items": [{ "productId": 1, "quantity": 2, "unitPrice": i64::MAX / 2 + 1 }]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("overflows"));
}

#[tokio::test]
async fn test_malformed_order_id() {
    let (app, _) = setup().await;

    let (status, _) = send(&app, "GET", "/orders/not-a-number", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_is_only_allowed_while_pending() {
    let (app, state) = setup().await;
    let product_id = create_product(&app, "Widget", 1000, 10).await;
    let order_id = place_order(&app, 3, product_id, 1).await["id"].as_i64().unwrap();
    settle(&state).await;

    let (status, json) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/cancel"),
        Some(json!({ "reason": "changed my mind" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("CONFIRMED"));
    state.runtime.shutdown().await;
}

#[tokio::test]
async fn test_cancel_unknown_order() {
    let (app, _) = setup().await;

    let (status, _) = send(&app, "POST", "/orders/12345/cancel", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_product_name_conflicts() {
    let (app, _) = setup().await;
    create_product(&app, "Gadget", 500, 3).await;

    let (status, _) = send(
        &app,
        "POST",
        "/inventory/products",
        Some(json!({ "name": "Gadget", "price": 700, "stockQuantity": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_availability_and_available_products() {
    let (app, _) = setup().await;
    let in_stock = create_product(&app, "In stock", 500, 3).await;
    create_product(&app, "Sold out", 500, 0).await;

    let (status, json) = send(
        &app,
        "GET",
        &format!("/inventory/products/{in_stock}/availability?quantity=3"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["available"], true);

    let (_, json) = send(
        &app,
        "GET",
        &format!("/inventory/products/{in_stock}/availability?quantity=4"),
        None,
    )
    .await;
    assert_eq!(json["available"], false);

    let (_, available) = send(&app, "GET", "/inventory/products/available", None).await;
    let names: Vec<&str> = available
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["In stock"]);

    let (_, all) = send(&app, "GET", "/inventory/products", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "GET", "/inventory/products/404/availability?quantity=1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_seed_catalog_is_idempotent() {
    let (app, state) = setup().await;

    assert_eq!(api::seed_catalog(&state.runtime).await.unwrap(), 5);
    assert_eq!(api::seed_catalog(&state.runtime).await.unwrap(), 0);

    let (_, all) = send(&app, "GET", "/inventory/products", None).await;
    assert_eq!(all.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_dead_letters_start_empty() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, "GET", "/dead-letters", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!([]));
}
