use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, ModuleGrant},
    errors::ServiceError,
    services::permissions::EffectivePermissions,
    ApiResponse, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/roles/{role}/permissions",
    summary = "Role grants",
    description = "Built-in defaults for the role with any stored overrides applied",
    params(("role" = String, Path, description = "Role name")),
    responses(
        (status = 200, description = "Grants per module", body = ApiResponse<Vec<ModuleGrant>>),
        (status = 404, description = "Unknown role", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "permissions"
)]
pub async fn get_role_permissions(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<Json<ApiResponse<Vec<ModuleGrant>>>, ServiceError> {
    let grants = state.services.permissions.get_role(&role).await?;
    Ok(Json(ApiResponse::success(grants)))
}

#[utoipa::path(
    put,
    path = "/api/v1/roles/{role}/permissions",
    summary = "Replace role grants",
    params(("role" = String, Path, description = "Role name")),
    request_body = Vec<ModuleGrant>,
    responses(
        (status = 200, description = "Resolved grants after the change", body = ApiResponse<Vec<ModuleGrant>>),
        (status = 400, description = "Unknown or repeated module", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown role", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "permissions"
)]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    Path(role): Path<String>,
    auth_user: AuthUser,
    Json(grants): Json<Vec<ModuleGrant>>,
) -> Result<Json<ApiResponse<Vec<ModuleGrant>>>, ServiceError> {
    let details = json!({ "grants": grants });
    let resolved = state.services.permissions.set_role(&role, grants).await?;
    state
        .services
        .audit
        .record(&auth_user, "set_permissions", "role", Some(role), Some(details))
        .await;
    Ok(Json(ApiResponse::success(resolved)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/permissions",
    summary = "User overrides",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Per-user grant overrides", body = ApiResponse<Vec<ModuleGrant>>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "permissions"
)]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<ModuleGrant>>>, ServiceError> {
    let grants = state.services.permissions.get_user(id).await?;
    Ok(Json(ApiResponse::success(grants)))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/permissions",
    summary = "Replace user overrides",
    description = "An empty list removes every override. Takes effect at the user's next login.",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = Vec<ModuleGrant>,
    responses(
        (status = 200, description = "Effective permissions after the change", body = ApiResponse<EffectivePermissions>),
        (status = 400, description = "Unknown or repeated module", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "permissions"
)]
pub async fn set_user_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(grants): Json<Vec<ModuleGrant>>,
) -> Result<Json<ApiResponse<EffectivePermissions>>, ServiceError> {
    let details = json!({ "grants": grants });
    let effective = state.services.permissions.set_user(id, grants).await?;
    state
        .services
        .audit
        .record(
            &auth_user,
            "set_permissions",
            "user",
            Some(id.to_string()),
            Some(details),
        )
        .await;
    Ok(Json(ApiResponse::success(effective)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/effective-permissions",
    summary = "Effective permissions",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Role grants merged with user overrides", body = ApiResponse<EffectivePermissions>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "permissions"
)]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EffectivePermissions>>, ServiceError> {
    let effective = state.services.permissions.effective(id).await?;
    Ok(Json(ApiResponse::success(effective)))
}
