use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use super::common::validation_failure;
use crate::{
    auth::AuthUser,
    entities::{attendance, staff},
    errors::ServiceError,
    services::staff::{
        AttendanceFilter, CheckRequest, CreateStaffRequest, MarkAttendanceRequest,
        PayrollSummary, UpdateStaffRequest,
    },
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StaffQuery {
    /// Matches name or position
    pub search: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayrollQuery {
    /// Defaults to the current year
    pub year: Option<i32>,
    /// 1-12, defaults to the current month
    pub month: Option<u32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/staff",
    summary = "List staff",
    params(ListQuery, StaffQuery),
    responses((status = 200, description = "Staff members", body = ApiResponse<PaginatedResponse<staff::Model>>)),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn list_staff(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filter): Query<StaffQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<staff::Model>>>, ServiceError> {
    let (page, limit) = state.paging(&query);
    let (items, total) = state
        .services
        .staff
        .list(filter.search.as_deref(), filter.active, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, page, limit,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/{id}",
    summary = "Get staff member",
    params(("id" = Uuid, Path, description = "Staff ID")),
    responses(
        (status = 200, description = "Staff member", body = ApiResponse<staff::Model>),
        (status = 404, description = "Staff member not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn get_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<staff::Model>>, ServiceError> {
    let member = state.services.staff.get(id).await?;
    Ok(Json(ApiResponse::success(member)))
}

#[utoipa::path(
    post,
    path = "/api/v1/staff",
    summary = "Add staff member",
    request_body = CreateStaffRequest,
    responses(
        (status = 201, description = "Staff member added", body = ApiResponse<staff::Model>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn create_staff(
    State(state): State<AppState>,
    Json(request): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<ApiResponse<staff::Model>>), ServiceError> {
    if let Err(errors) = request.validate() {
        return Ok(validation_failure(&errors));
    }
    let member = state.services.staff.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(member))))
}

#[utoipa::path(
    put,
    path = "/api/v1/staff/{id}",
    summary = "Update staff member",
    params(("id" = Uuid, Path, description = "Staff ID")),
    request_body = UpdateStaffRequest,
    responses(
        (status = 200, description = "Staff member updated", body = ApiResponse<staff::Model>),
        (status = 404, description = "Staff member not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStaffRequest>,
) -> Result<Json<ApiResponse<staff::Model>>, ServiceError> {
    let member = state.services.staff.update(id, request).await?;
    Ok(Json(ApiResponse::success(member)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/staff/{id}",
    summary = "Delete staff member",
    description = "Attendance rows go with the staff member. Staff assigned to production must be deactivated instead.",
    params(("id" = Uuid, Path, description = "Staff ID")),
    responses(
        (status = 204, description = "Staff member deleted"),
        (status = 404, description = "Staff member not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Assigned to production", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn delete_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> Result<StatusCode, ServiceError> {
    let member = state.services.staff.get(id).await?;
    state.services.staff.delete(id).await?;
    state
        .services
        .audit
        .record(
            &auth_user,
            "delete",
            "staff",
            Some(id.to_string()),
            Some(json!({ "name": member.name })),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/attendance",
    summary = "Attendance rows",
    params(AttendanceFilter),
    responses((status = 200, description = "Attendance, newest day first", body = ApiResponse<Vec<attendance::Model>>)),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn list_attendance(
    State(state): State<AppState>,
    Query(filter): Query<AttendanceFilter>,
) -> Result<Json<ApiResponse<Vec<attendance::Model>>>, ServiceError> {
    let rows = state.services.staff.attendance(&filter).await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[utoipa::path(
    post,
    path = "/api/v1/staff/attendance",
    summary = "Mark attendance",
    description = "Creates or replaces the row for the staff member and date",
    request_body = MarkAttendanceRequest,
    responses(
        (status = 200, description = "Attendance stored", body = ApiResponse<attendance::Model>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
        (status = 404, description = "Staff member not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn mark_attendance(
    State(state): State<AppState>,
    Json(request): Json<MarkAttendanceRequest>,
) -> Result<Json<ApiResponse<attendance::Model>>, ServiceError> {
    let row = state.services.staff.mark_attendance(request).await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    post,
    path = "/api/v1/staff/attendance/check-in",
    summary = "Check in for today",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Checked in", body = ApiResponse<attendance::Model>),
        (status = 400, description = "Staff member is inactive", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already checked in", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn check_in(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<ApiResponse<attendance::Model>>, ServiceError> {
    let row = state.services.staff.check_in(request.staff_id).await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    post,
    path = "/api/v1/staff/attendance/check-out",
    summary = "Check out for today",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Checked out", body = ApiResponse<attendance::Model>),
        (status = 400, description = "Not checked in", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already checked out", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn check_out(
    State(state): State<AppState>,
    Json(request): Json<CheckRequest>,
) -> Result<Json<ApiResponse<attendance::Model>>, ServiceError> {
    let row = state.services.staff.check_out(request.staff_id).await?;
    Ok(Json(ApiResponse::success(row)))
}

#[utoipa::path(
    get,
    path = "/api/v1/staff/payroll",
    summary = "Monthly payroll",
    description = "Gross pay for every active staff member from the month's attendance",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Payroll summary", body = ApiResponse<PayrollSummary>),
        (status = 400, description = "Invalid month", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "staff"
)]
pub async fn payroll(
    State(state): State<AppState>,
    Query(query): Query<PayrollQuery>,
) -> Result<Json<ApiResponse<PayrollSummary>>, ServiceError> {
    let today = Utc::now().date_naive();
    let summary = state
        .services
        .staff
        .payroll(
            query.year.unwrap_or_else(|| today.year()),
            query.month.unwrap_or_else(|| today.month()),
        )
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}
