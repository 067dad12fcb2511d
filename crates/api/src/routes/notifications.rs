use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::UserId;
use saga::notification::Notification;

use super::AppState;
use crate::error::ApiError;

/// GET /notifications/user/{user_id}
#[tracing::instrument(skip(state))]
pub async fn by_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(
        state
            .runtime
            .notifications()
            .notifications_for_user(user_id)
            .await?,
    ))
}
