use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    entities::order,
    errors::ServiceError,
    services::dashboard::{DashboardSummary, SalesPoint},
    ApiResponse, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendQuery {
    /// Days to include, ending today (1-90, default 7)
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentQuery {
    /// 1-50, default 10
    pub limit: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/summary",
    summary = "Today at a glance",
    responses((status = 200, description = "Dashboard counters", body = ApiResponse<DashboardSummary>)),
    security(("Bearer" = [])),
    tag = "dashboard"
)]
pub async fn summary(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardSummary>>, ServiceError> {
    let summary = state.services.dashboard.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/sales-trend",
    summary = "Daily sales",
    params(TrendQuery),
    responses((status = 200, description = "One point per day, oldest first", body = ApiResponse<Vec<SalesPoint>>)),
    security(("Bearer" = [])),
    tag = "dashboard"
)]
pub async fn sales_trend(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<ApiResponse<Vec<SalesPoint>>>, ServiceError> {
    let points = state
        .services
        .dashboard
        .sales_trend(query.days.unwrap_or(7))
        .await?;
    Ok(Json(ApiResponse::success(points)))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/recent-orders",
    summary = "Latest orders",
    params(RecentQuery),
    responses((status = 200, description = "Newest first", body = ApiResponse<Vec<order::Model>>)),
    security(("Bearer" = [])),
    tag = "dashboard"
)]
pub async fn recent_orders(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<ApiResponse<Vec<order::Model>>>, ServiceError> {
    let orders = state
        .services
        .dashboard
        .recent_orders(query.limit.unwrap_or(10))
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}
