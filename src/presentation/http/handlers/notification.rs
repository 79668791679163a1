//! Notification Handlers

use axum::{
    extract::{Extension, Query, State},
    Json,
};

use super::chat::ListQuery;
use crate::application::dto::request::SeenNotificationRequest;
use crate::application::dto::response::{NotificationListResponse, SeenNotificationsResponse};
use crate::domain::Pagination;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::parse_id_field;
use crate::startup::AppState;

/// List the caller's notifications, newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<NotificationListResponse>, AppError> {
    let chat = &state.settings.chat;
    let pagination =
        Pagination::from_query(query.page, query.limit, chat.notifications_page_size, chat.max_page_size);

    let list = state.notifications.list(auth.user_id, pagination).await?;
    Ok(Json(NotificationListResponse::from(list)))
}

/// Mark one notification, or all of them, seen
pub async fn mark_seen(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    body: Option<Json<SeenNotificationRequest>>,
) -> Result<Json<SeenNotificationsResponse>, AppError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let notification_id = body
        .notification_id
        .as_deref()
        .map(|id| parse_id_field("notification_id", id))
        .transpose()?;

    let unseen_count = state.notifications.mark_seen(auth.user_id, notification_id).await?;
    Ok(Json(SeenNotificationsResponse { unseen_count }))
}
