use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use super::common::validation_failure;
use crate::{
    auth::AuthUser,
    entities::{inventory_item, inventory_movement},
    errors::ServiceError,
    services::inventory::{
        AdjustStockRequest, CreateInventoryItemRequest, InventoryFilter, StockAdjustment,
        UpdateInventoryItemRequest,
    },
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    summary = "List inventory items",
    params(ListQuery, InventoryFilter),
    responses(
        (status = 200, description = "Inventory items", body = ApiResponse<PaginatedResponse<inventory_item::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<InventoryFilter>,
) -> Result<Json<ApiResponse<PaginatedResponse<inventory_item::Model>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (items, total) = state.services.inventory.list(&filter, page, limit).await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    summary = "Items at or below reorder level",
    responses(
        (status = 200, description = "Low stock items, most urgent first", body = ApiResponse<Vec<inventory_item::Model>>),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn get_low_stock_items(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<inventory_item::Model>>>, ServiceError> {
    let items = state.services.inventory.low_stock().await?;
    Ok(Json(ApiResponse::success(items)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}",
    summary = "Get inventory item",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Inventory item", body = ApiResponse<inventory_item::Model>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn get_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<inventory_item::Model>>, ServiceError> {
    let item = state.services.inventory.get(id).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    summary = "Create inventory item",
    description = "A non-zero starting quantity is recorded as an opening stock movement",
    request_body = CreateInventoryItemRequest,
    responses(
        (status = 201, description = "Item created", body = ApiResponse<inventory_item::Model>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already used", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn create_inventory(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateInventoryItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<inventory_item::Model>>), ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(validation_failure(&errors));
    }
    let item = state
        .services
        .inventory
        .create(request, Some(auth_user.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

#[utoipa::path(
    put,
    path = "/api/v1/inventory/{id}",
    summary = "Update inventory item",
    description = "Quantity cannot be set here; use the adjust endpoint",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    request_body = UpdateInventoryItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<inventory_item::Model>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn update_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateInventoryItemRequest>,
) -> Result<Json<ApiResponse<inventory_item::Model>>, ServiceError> {
    let item = state.services.inventory.update(id, request).await?;
    Ok(Json(ApiResponse::success(item)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/inventory/{id}",
    summary = "Delete inventory item",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn delete_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.inventory.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/{id}/adjust",
    summary = "Adjust stock",
    description = "Apply a signed quantity change and record the movement",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<StockAdjustment>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Would take stock below zero", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<ApiResponse<StockAdjustment>>, ServiceError> {
    let adjustment = state
        .services
        .inventory
        .adjust(id, request, Some(auth_user.user_id))
        .await?;
    Ok(Json(ApiResponse::success(adjustment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/{id}/movements",
    summary = "Stock movement history",
    params(("id" = Uuid, Path, description = "Inventory item ID"), ListQuery),
    responses(
        (status = 200, description = "Movements, newest first", body = ApiResponse<PaginatedResponse<inventory_movement::Model>>),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "inventory"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<inventory_movement::Model>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (items, total) = state
        .services
        .inventory
        .movements(id, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}
