use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use parley_types::models::Notification;

use crate::convert;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::middleware::CurrentUser;
use crate::state::{AppState, run_db};

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unseen: bool,
}

/// The caller's notifications, newest first. `?unseen=true` hides seen ones.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = user.id.to_string();
    let rows = run_db(&state, move |db| db.notifications_for(&uid, query.unseen)).await?;

    let notifications: Vec<Notification> = rows.into_iter().map(convert::notification).collect();
    Ok(Json(notifications))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let nid = notification_id.to_string();
    let uid = user.id.to_string();
    let updated = run_db(&state, move |db| db.mark_notification_seen(&nid, &uid)).await?;

    // Someone else's notification looks the same as a missing one.
    if !updated {
        return Err(ApiError::not_found("Notification does not exist."));
    }
    Ok(StatusCode::NO_CONTENT)
}
