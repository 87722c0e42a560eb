use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use utoipa::ToSchema;

use crate::{
    auth::AuthUser, entities::setting, errors::ServiceError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SettingValue {
    /// Any JSON value
    pub value: Value,
}

#[utoipa::path(
    get,
    path = "/api/v1/settings",
    summary = "All settings",
    description = "Stored settings merged over the built-in defaults",
    responses((status = 200, description = "Settings object", body = ApiResponse<serde_json::Value>)),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let settings = state.services.settings.all().await?;
    Ok(Json(ApiResponse::success(Value::Object(settings))))
}

#[utoipa::path(
    get,
    path = "/api/v1/settings/{key}",
    summary = "One setting",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Setting value", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Unknown key", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn get_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<Value>>, ServiceError> {
    let value = state.services.settings.get(&key).await?;
    Ok(Json(ApiResponse::success(value)))
}

#[utoipa::path(
    put,
    path = "/api/v1/settings/{key}",
    summary = "Store a setting",
    params(("key" = String, Path, description = "Setting key")),
    request_body = SettingValue,
    responses(
        (status = 200, description = "Setting stored", body = ApiResponse<setting::Model>),
        (status = 400, description = "Bad key or value of the wrong type", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    auth_user: AuthUser,
    Json(body): Json<SettingValue>,
) -> Result<Json<ApiResponse<setting::Model>>, ServiceError> {
    let stored = state
        .services
        .settings
        .set(&key, body.value, Some(auth_user.user_id))
        .await?;
    state
        .services
        .audit
        .record(
            &auth_user,
            "update",
            "setting",
            Some(key),
            Some(json!({ "value": stored.value })),
        )
        .await;
    Ok(Json(ApiResponse::success(stored)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/settings/{key}",
    summary = "Remove a setting",
    description = "Keys with a built-in default fall back to it",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 204, description = "Setting removed"),
        (status = 404, description = "Setting not stored", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "settings"
)]
pub async fn delete_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    auth_user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.settings.delete(&key).await?;
    state
        .services
        .audit
        .record(&auth_user, "delete", "setting", Some(key), None)
        .await;
    Ok(StatusCode::NO_CONTENT)
}
