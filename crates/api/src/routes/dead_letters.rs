//! Events that exhausted their delivery attempts, for manual inspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use event_bus::DeadLetter;

use super::AppState;

/// GET /dead-letters
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<DeadLetter>> {
    Json(state.runtime.dead_letters().await)
}
