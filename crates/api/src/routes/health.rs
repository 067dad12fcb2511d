//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub dead_letters: usize,
}

/// GET /health: `degraded` once any event has been dead-lettered.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dead_letters = state.runtime.dead_letters().await.len();
    let status = if dead_letters == 0 { "ok" } else { "degraded" };
    Json(HealthResponse {
        status,
        dead_letters,
    })
}
