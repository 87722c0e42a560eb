use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{entities::notification, errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkedRead {
    pub updated: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    summary = "Notification feed",
    params(NotificationQuery),
    responses((status = 200, description = "Newest first", body = ApiResponse<Vec<notification::Model>>)),
    security(("Bearer" = [])),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<Vec<notification::Model>>>, ServiceError> {
    let limit = state.config.page_size(query.limit);
    let items = state
        .services
        .notifications
        .list(query.unread_only, limit)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    summary = "Unread notification count",
    responses((status = 200, description = "Count", body = ApiResponse<UnreadCount>)),
    security(("Bearer" = [])),
    tag = "notifications"
)]
pub async fn unread_count(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UnreadCount>>, ServiceError> {
    let unread = state.services.notifications.unread_count().await?;
    Ok(Json(ApiResponse::success(UnreadCount { unread })))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    summary = "Mark one notification read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read", body = ApiResponse<notification::Model>),
        (status = 404, description = "Notification not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<notification::Model>>, ServiceError> {
    let item = state.services.notifications.mark_read(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    summary = "Mark every notification read",
    responses((status = 200, description = "Rows updated", body = ApiResponse<MarkedRead>)),
    security(("Bearer" = [])),
    tag = "notifications"
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MarkedRead>>, ServiceError> {
    let updated = state.services.notifications.mark_all_read().await?;
    Ok(Json(ApiResponse::success(MarkedRead { updated })))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    summary = "Delete notification",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Notification not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "notifications"
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.notifications.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
