use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::common::validation_failure;
use crate::{
    auth::AuthUser,
    entities::production_item,
    errors::ServiceError,
    services::production::{
        CreateProductionRequest, ProductionEntry, ProductionFilter, ProductionStatusRequest,
        UpdateProductionRequest,
    },
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/production",
    summary = "List production schedule",
    params(ListQuery, ProductionFilter),
    responses(
        (status = 200, description = "Scheduled batches", body = ApiResponse<PaginatedResponse<ProductionEntry>>),
    ),
    security(("Bearer" = [])),
    tag = "production"
)]
pub async fn list_production(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<ProductionFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<ProductionEntry>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (items, total) = state
        .services
        .production
        .list(&filter, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/production/today",
    summary = "Today's production",
    responses(
        (status = 200, description = "Batches scheduled for today", body = ApiResponse<Vec<ProductionEntry>>),
    ),
    security(("Bearer" = [])),
    tag = "production"
)]
pub async fn production_today(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProductionEntry>>>, ServiceError> {
    let today = Utc::now().date_naive();
    let entries = state.services.production.for_date(today).await?;
    Ok(Json(ApiResponse::success(entries)))
}

#[utoipa::path(
    get,
    path = "/api/v1/production/{id}",
    summary = "Get production batch",
    params(("id" = Uuid, Path, description = "Schedule item ID")),
    responses(
        (status = 200, description = "Batch", body = ApiResponse<production_item::Model>),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "production"
)]
pub async fn get_production(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<production_item::Model>>, ServiceError> {
    let item = state.services.production.get(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    post,
    path = "/api/v1/production",
    summary = "Schedule a batch",
    request_body = CreateProductionRequest,
    responses(
        (status = 201, description = "Batch scheduled", body = ApiResponse<production_item::Model>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product or staff not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "production"
)]
pub async fn create_production(
    State(state): State<AppState>,
    Json(request): Json<CreateProductionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<production_item::Model>>), ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(validation_failure(&errors));
    }
    let item = state.services.production.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

#[utoipa::path(
    put,
    path = "/api/v1/production/{id}",
    summary = "Update a planned batch",
    params(("id" = Uuid, Path, description = "Schedule item ID")),
    request_body = UpdateProductionRequest,
    responses(
        (status = 200, description = "Batch updated", body = ApiResponse<production_item::Model>),
        (status = 400, description = "Batch already started", body = crate::errors::ErrorResponse),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "production"
)]
pub async fn update_production(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductionRequest>,
) -> Result<Json<ApiResponse<production_item::Model>>, ServiceError> {
    let item = state.services.production.update(id, request).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    put,
    path = "/api/v1/production/{id}/status",
    summary = "Move batch to a new status",
    description = "planned → in_progress → completed; cancelled from planned or in_progress. Completing adds the quantity to the linked finished-good stock.",
    params(("id" = Uuid, Path, description = "Schedule item ID")),
    request_body = ProductionStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<production_item::Model>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "production"
)]
pub async fn update_production_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<ProductionStatusRequest>,
) -> Result<Json<ApiResponse<production_item::Model>>, ServiceError> {
    let item = state
        .services
        .production
        .set_status(id, request.status, Some(auth_user.user_id))
        .await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/production/{id}",
    summary = "Delete batch",
    params(("id" = Uuid, Path, description = "Schedule item ID")),
    responses(
        (status = 204, description = "Batch deleted"),
        (status = 400, description = "Completed batches are kept", body = crate::errors::ErrorResponse),
        (status = 404, description = "Batch not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "production"
)]
pub async fn delete_production(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.production.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
