use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use super::common::{validation_failure, SearchQuery};
use crate::{
    auth::AuthUser,
    entities::party,
    errors::ServiceError,
    services::parties::{CreatePartyRequest, UpdatePartyRequest},
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/parties",
    summary = "List parties",
    description = "Suppliers and other accounts the business owes",
    params(ListQuery, SearchQuery),
    responses(
        (status = 200, description = "Parties", body = ApiResponse<PaginatedResponse<party::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "parties"
)]
pub async fn list_parties(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(search): Query<SearchQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<party::Model>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (items, total) = state
        .services
        .parties
        .list(search.search.as_deref(), page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/parties/{id}",
    summary = "Get party",
    params(("id" = Uuid, Path, description = "Party ID")),
    responses(
        (status = 200, description = "Party", body = ApiResponse<party::Model>),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "parties"
)]
pub async fn get_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<party::Model>>, ServiceError> {
    let party = state.services.parties.get(id).await?;
    Ok(Json(ApiResponse::success(party)))
}

#[utoipa::path(
    post,
    path = "/api/v1/parties",
    summary = "Create party",
    request_body = CreatePartyRequest,
    responses(
        (status = 201, description = "Party created", body = ApiResponse<party::Model>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "parties"
)]
pub async fn create_party(
    State(state): State<AppState>,
    Json(request): Json<CreatePartyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<party::Model>>), ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(validation_failure(&errors));
    }
    let party = state.services.parties.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(party))))
}

#[utoipa::path(
    put,
    path = "/api/v1/parties/{id}",
    summary = "Update party",
    description = "Changing the opening balance replays the whole ledger",
    params(("id" = Uuid, Path, description = "Party ID")),
    request_body = UpdatePartyRequest,
    responses(
        (status = 200, description = "Party updated", body = ApiResponse<party::Model>),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "parties"
)]
pub async fn update_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePartyRequest>,
) -> Result<Json<ApiResponse<party::Model>>, ServiceError> {
    let party = state.services.parties.update(id, request).await?;
    Ok(Json(ApiResponse::success(party)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/parties/{id}",
    summary = "Delete party",
    params(("id" = Uuid, Path, description = "Party ID")),
    responses(
        (status = 204, description = "Party deleted"),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Party has ledger history or supplies stock", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "parties"
)]
pub async fn delete_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    state.services.parties.delete(id).await?;
    state
        .services
        .audit
        .record(&auth_user, "delete", "party", Some(id.to_string()), None)
        .await;
    Ok(StatusCode::NO_CONTENT)
}
