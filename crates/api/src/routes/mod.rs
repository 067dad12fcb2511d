//! HTTP route handlers.

use std::sync::Arc;

use saga::SagaRuntime;

pub mod dead_letters;
pub mod health;
pub mod inventory;
pub mod invoices;
pub mod metrics;
pub mod notifications;
pub mod orders;
pub mod payments;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub runtime: Arc<SagaRuntime>,
}
