/*!
 * # Health Check Module
 *
 * Probes for load balancers and process supervisors:
 *
 * - `/health` reports overall status with a database round-trip
 * - `/health/ready` answers 503 until the database responds
 * - `/health/live` only proves the process is serving requests
 * - `/health/version` returns build information
 */

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::db::{self, DbPool};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub checks: BTreeMap<String, ComponentHealth>,
}

#[derive(Clone)]
pub struct HealthState {
    db_pool: Arc<DbPool>,
    started: Instant,
}

impl HealthState {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db_pool,
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    async fn database(&self) -> ComponentHealth {
        match db::check_connection(&self.db_pool).await {
            Ok(latency) => ComponentHealth {
                status: HealthStatus::Up,
                latency_ms: Some(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)),
                message: None,
            },
            Err(e) => {
                error!(error = %e, "Database health check failed");
                ComponentHealth {
                    status: HealthStatus::Down,
                    latency_ms: None,
                    message: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn report(&self) -> HealthReport {
        let mut checks = BTreeMap::new();
        checks.insert("database".to_string(), self.database().await);
        let status = if checks.values().all(|c| c.status == HealthStatus::Up) {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };
        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.uptime(),
            checks,
        }
    }
}

fn status_code(status: HealthStatus) -> StatusCode {
    match status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "Service health",
    responses(
        (status = 200, description = "All checks passed", body = HealthReport),
        (status = 503, description = "A dependency is down", body = HealthReport),
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let report = state.report().await;
    debug!(status = ?report.status, "Health check");
    (status_code(report.status), Json(report))
}

pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let report = state.report().await;
    (
        status_code(report.status),
        Json(json!({
            "ready": report.status == HealthStatus::Up,
            "timestamp": report.timestamp,
        })),
    )
}

pub async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(json!({
        "alive": true,
        "uptime_seconds": state.uptime(),
        "timestamp": Utc::now(),
    }))
}

pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
        "built": option_env!("BUILD_TIME").unwrap_or("unknown"),
    }))
}

/// Health endpoints, mounted under `/health`
pub fn health_routes(db_pool: Arc<DbPool>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/version", get(version_info))
        .with_state(Arc::new(HealthState::new(db_pool)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Database;

    #[tokio::test]
    async fn report_is_up_for_a_live_database() {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        let state = HealthState::new(Arc::new(pool));
        let report = state.report().await;
        assert_eq!(report.status, HealthStatus::Up);
        assert_eq!(report.checks["database"].status, HealthStatus::Up);
    }

    #[test]
    fn down_maps_to_service_unavailable() {
        assert_eq!(status_code(HealthStatus::Down), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_code(HealthStatus::Up), StatusCode::OK);
    }
}
