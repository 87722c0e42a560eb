use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::common::{client_ip, user_agent, validation_messages};
use crate::{
    auth::{AuthUser, TokenPair},
    errors::ServiceError,
    services::{
        audit::LoginAttempt,
        permissions::{EffectivePermissions, PermissionService},
        users::{ChangePasswordRequest, UserView},
    },
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Username or email
    #[validate(length(min = 1, max = 254))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenPair,
    pub user: UserView,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: UserView,
    pub permissions: EffectivePermissions,
}

const BAD_CREDENTIALS: &str = "Invalid username or password";

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Log in",
    description = "Exchange a username (or email) and password for a session token. The token is also set as an HttpOnly cookie.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Malformed request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid credentials or disabled account", body = crate::errors::ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if let Err(errors) = request.validate() {
        return Err(ServiceError::ValidationError(
            validation_messages(&errors).join("; "),
        ));
    }

    let attempt = |user_id, success| LoginAttempt {
        user_id,
        username: request.username.trim().to_lowercase(),
        success,
        ip_address: client_ip(&headers),
        user_agent: user_agent(&headers),
    };
    let audit = &state.services.audit;

    let Some(user) = state
        .services
        .users
        .authenticate(&request.username, &request.password)
        .await?
    else {
        audit.record_login(attempt(None, false)).await;
        counter!("bakery_auth_logins", 1, "result" => "bad_credentials");
        return Err(ServiceError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    if !user.is_active {
        audit.record_login(attempt(Some(user.id), false)).await;
        counter!("bakery_auth_logins", 1, "result" => "inactive");
        warn!(user_id = %user.id, "Login refused for inactive account");
        return Err(ServiceError::Unauthorized(
            "Account is disabled".to_string(),
        ));
    }

    let effective = PermissionService::effective_for(&*state.db, &user).await?;
    let token = state
        .auth
        .generate_token(&user, effective.permissions.clone())?;
    state.services.users.touch_last_login(user.id).await?;
    audit.record_login(attempt(Some(user.id), true)).await;
    counter!("bakery_auth_logins", 1, "result" => "success");
    info!(user_id = %user.id, role = %user.role, "User logged in");

    let cookie = state.auth.session_cookie(&token.access_token);
    let body = LoginResponse {
        token,
        user: user.into(),
        permissions: effective.permissions,
    };
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(body)),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    summary = "Log out",
    description = "Revoke the current token and clear the session cookie",
    responses(
        (status = 200, description = "Logged out", body = ApiResponse<String>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> impl IntoResponse {
    state
        .auth
        .revoke(&auth_user.token_id, auth_user.expires_at)
        .await;
    info!(user_id = %auth_user.user_id, "User logged out");
    (
        [(header::SET_COOKIE, state.auth.clear_session_cookie())],
        Json(ApiResponse::success("Logged out".to_string())),
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    summary = "Current user",
    description = "The authenticated user with permissions resolved from the current grants",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<MeResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<MeResponse>>, ServiceError> {
    let user = state.services.users.get(auth_user.user_id).await?;
    let permissions = PermissionService::effective_for(&*state.db, &user).await?;
    Ok(Json(ApiResponse::success(MeResponse {
        user: user.into(),
        permissions,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    summary = "Change own password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<String>),
        (status = 400, description = "Weak new password", body = crate::errors::ErrorResponse),
        (status = 401, description = "Current password is wrong", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state
        .services
        .users
        .change_password(auth_user.user_id, request)
        .await?;
    state
        .services
        .audit
        .record(
            &auth_user,
            "change_password",
            "user",
            Some(auth_user.user_id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success("Password changed".to_string())))
}
