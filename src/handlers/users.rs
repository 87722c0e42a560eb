use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use super::common::validation_failure;
use crate::{
    auth::AuthUser,
    entities::{audit_log, login_log},
    errors::ServiceError,
    services::{
        audit::AuditLogFilter,
        users::{CreateUserRequest, ResetPasswordRequest, UpdateUserRequest, UserFilter, UserView},
    },
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoginLogQuery {
    pub user_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    summary = "List users",
    params(ListQuery, UserFilter),
    responses(
        (status = 200, description = "Users", body = ApiResponse<PaginatedResponse<UserView>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<UserFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<UserView>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (users, total) = state.services.users.list(&filter, page, limit).await?;
    let items = users.into_iter().map(UserView::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    summary = "Get user",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = ApiResponse<UserView>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserView>>, ServiceError> {
    let user = state.services.users.get(id).await?;
    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Create user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserView>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username or email taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserView>>), ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(validation_failure(&errors));
    }
    let user = state.services.users.create(request).await?;
    state
        .services
        .audit
        .record(
            &auth_user,
            "create",
            "user",
            Some(user.id.to_string()),
            Some(json!({ "username": user.username, "role": user.role })),
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}",
    summary = "Update user",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserView>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserView>>, ServiceError> {
    let details = json!({
        "role": request.role,
        "is_active": request.is_active,
    });
    let user = state
        .services
        .users
        .update(id, request, auth_user.user_id)
        .await?;
    state
        .services
        .audit
        .record(&auth_user, "update", "user", Some(id.to_string()), Some(details))
        .await;
    Ok(Json(ApiResponse::success(user.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/{id}/reset-password",
    summary = "Reset a user's password",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = ApiResponse<String>),
        (status = 400, description = "Weak password", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    request.validate()?;
    state
        .services
        .users
        .reset_password(id, &request.new_password)
        .await?;
    state
        .services
        .audit
        .record(&auth_user, "reset_password", "user", Some(id.to_string()), None)
        .await;
    Ok(Json(ApiResponse::success("Password reset".to_string())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    summary = "Delete user",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete own account", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.users.delete(id, auth_user.user_id).await?;
    state
        .services
        .audit
        .record(&auth_user, "delete", "user", Some(id.to_string()), None)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/audit-logs",
    summary = "List audit log entries",
    params(ListQuery, AuditLogFilter),
    responses(
        (status = 200, description = "Audit trail, newest first", body = ApiResponse<PaginatedResponse<audit_log::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<AuditLogFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<audit_log::Model>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (items, total) = state.services.audit.list(&filter, page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/login-logs",
    summary = "List login attempts",
    params(ListQuery, LoginLogQuery),
    responses(
        (status = 200, description = "Login attempts, newest first", body = ApiResponse<PaginatedResponse<login_log::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "users"
)]
pub async fn list_login_logs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<LoginLogQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<login_log::Model>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (items, total) = state
        .services
        .audit
        .list_logins(filter.user_id, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}
