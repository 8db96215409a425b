use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::debug;

use bookswap_types::api::{Claims, StatusMessage};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/users/notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = state
        .run_db(move |db| db.list_notifications(claims.id))
        .await?;
    Ok(Json(notifications))
}

/// POST /api/users/notifications/read
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.id;
    let updated = state
        .run_db(move |db| db.mark_notifications_read(user_id))
        .await?;
    debug!("Marked {} notifications read for {}", updated, user_id);

    Ok(Json(StatusMessage::new("Notifications marked as read")))
}
