use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::ledger_transaction::{self, LedgerEntityType},
    errors::ServiceError,
    services::ledger::{LedgerEntryRequest, LedgerStatement, RecalculationResult},
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatementQuery {
    /// First day of the statement; earlier rows roll into the opening balance
    pub from: Option<NaiveDate>,
    /// Last day of the statement, inclusive
    pub to: Option<NaiveDate>,
}

type EntryResponse = (StatusCode, Json<ApiResponse<ledger_transaction::Model>>);

async fn post_entry(
    state: &AppState,
    entity_type: LedgerEntityType,
    entity_id: Uuid,
    auth_user: &AuthUser,
    request: LedgerEntryRequest,
) -> Result<EntryResponse, ServiceError> {
    let row = state
        .services
        .ledger
        .post(entity_type, entity_id, request, Some(auth_user.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(row))))
}

async fn recalculate(
    state: &AppState,
    entity_type: LedgerEntityType,
    entity_id: Uuid,
    auth_user: &AuthUser,
) -> Result<Json<ApiResponse<RecalculationResult>>, ServiceError> {
    let result = state
        .services
        .ledger
        .recalculate(entity_type, entity_id)
        .await?;
    state
        .services
        .audit
        .record(
            auth_user,
            "recalculate",
            &entity_type.to_string(),
            Some(entity_id.to_string()),
            Some(json!({ "rows": result.rows, "balance": result.balance })),
        )
        .await;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/ledger/customers/{id}/transactions",
    summary = "Post a customer ledger entry",
    description = "Exactly one of debit or credit must be positive. Balances from the entry's date onward are recomputed.",
    params(("id" = Uuid, Path, description = "Customer ID")),
    request_body = LedgerEntryRequest,
    responses(
        (status = 201, description = "Entry posted", body = ApiResponse<ledger_transaction::Model>),
        (status = 400, description = "Invalid amounts", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn post_customer_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<LedgerEntryRequest>,
) -> Result<EntryResponse, ServiceError> {
    post_entry(&state, LedgerEntityType::Customer, id, &auth_user, request).await
}

#[utoipa::path(
    post,
    path = "/api/v1/ledger/parties/{id}/transactions",
    summary = "Post a party ledger entry",
    description = "Exactly one of debit or credit must be positive. Balances from the entry's date onward are recomputed.",
    params(("id" = Uuid, Path, description = "Party ID")),
    request_body = LedgerEntryRequest,
    responses(
        (status = 201, description = "Entry posted", body = ApiResponse<ledger_transaction::Model>),
        (status = 400, description = "Invalid amounts", body = crate::errors::ErrorResponse),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn post_party_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<LedgerEntryRequest>,
) -> Result<EntryResponse, ServiceError> {
    post_entry(&state, LedgerEntityType::Party, id, &auth_user, request).await
}

#[utoipa::path(
    get,
    path = "/api/v1/ledger/customers/{id}/statement",
    summary = "Customer statement",
    params(("id" = Uuid, Path, description = "Customer ID"), StatementQuery),
    responses(
        (status = 200, description = "Statement for the period", body = ApiResponse<LedgerStatement>),
        (status = 400, description = "`from` is after `to`", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn customer_statement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatementQuery>,
) -> Result<Json<ApiResponse<LedgerStatement>>, ServiceError> {
    let statement = state
        .services
        .ledger
        .statement(LedgerEntityType::Customer, id, query.from, query.to)
        .await?;
    Ok(Json(ApiResponse::success(statement)))
}

#[utoipa::path(
    get,
    path = "/api/v1/ledger/parties/{id}/statement",
    summary = "Party statement",
    params(("id" = Uuid, Path, description = "Party ID"), StatementQuery),
    responses(
        (status = 200, description = "Statement for the period", body = ApiResponse<LedgerStatement>),
        (status = 400, description = "`from` is after `to`", body = crate::errors::ErrorResponse),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn party_statement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StatementQuery>,
) -> Result<Json<ApiResponse<LedgerStatement>>, ServiceError> {
    let statement = state
        .services
        .ledger
        .statement(LedgerEntityType::Party, id, query.from, query.to)
        .await?;
    Ok(Json(ApiResponse::success(statement)))
}

#[utoipa::path(
    post,
    path = "/api/v1/ledger/customers/{id}/recalculate",
    summary = "Replay a customer ledger",
    params(("id" = Uuid, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Balances recomputed", body = ApiResponse<RecalculationResult>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn recalculate_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<RecalculationResult>>, ServiceError> {
    recalculate(&state, LedgerEntityType::Customer, id, &auth_user).await
}

#[utoipa::path(
    post,
    path = "/api/v1/ledger/parties/{id}/recalculate",
    summary = "Replay a party ledger",
    params(("id" = Uuid, Path, description = "Party ID")),
    responses(
        (status = 200, description = "Balances recomputed", body = ApiResponse<RecalculationResult>),
        (status = 404, description = "Party not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn recalculate_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<RecalculationResult>>, ServiceError> {
    recalculate(&state, LedgerEntityType::Party, id, &auth_user).await
}

#[utoipa::path(
    get,
    path = "/api/v1/ledger/transactions/{id}",
    summary = "Get ledger entry",
    params(("id" = Uuid, Path, description = "Ledger transaction ID")),
    responses(
        (status = 200, description = "Ledger entry", body = ApiResponse<ledger_transaction::Model>),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ledger_transaction::Model>>, ServiceError> {
    let row = state.services.ledger.get(id).await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    put,
    path = "/api/v1/ledger/transactions/{id}",
    summary = "Edit ledger entry",
    description = "Balances are recomputed from the earlier of the old and new dates",
    params(("id" = Uuid, Path, description = "Ledger transaction ID")),
    request_body = LedgerEntryRequest,
    responses(
        (status = 200, description = "Entry updated", body = ApiResponse<ledger_transaction::Model>),
        (status = 400, description = "Invalid amounts", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Entry was posted by an order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<LedgerEntryRequest>,
) -> Result<Json<ApiResponse<ledger_transaction::Model>>, ServiceError> {
    let before = state.services.ledger.get(id).await?;
    let row = state.services.ledger.update(id, request).await?;
    state
        .services
        .audit
        .record(
            &auth_user,
            "update",
            "ledger_transaction",
            Some(id.to_string()),
            Some(json!({
                "before": { "txn_date": before.txn_date, "debit": before.debit, "credit": before.credit },
                "after": { "txn_date": row.txn_date, "debit": row.debit, "credit": row.credit },
            })),
        )
        .await;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/ledger/transactions/{id}",
    summary = "Delete ledger entry",
    params(("id" = Uuid, Path, description = "Ledger transaction ID")),
    responses(
        (status = 200, description = "Entry removed and balances recomputed", body = ApiResponse<RecalculationResult>),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Entry was posted by an order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "ledger"
)]
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<RecalculationResult>>, ServiceError> {
    let result = state.services.ledger.delete(id).await?;
    state
        .services
        .audit
        .record(
            &auth_user,
            "delete",
            "ledger_transaction",
            Some(id.to_string()),
            Some(json!({ "entity_id": result.entity_id, "balance": result.balance })),
        )
        .await;
    Ok(Json(ApiResponse::success(result)))
}
