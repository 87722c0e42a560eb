//! Bakery API Library
//!
//! Back-office service for a bakery or small workshop: orders, products,
//! stock, production, staff and payroll, and running ledgers for customers
//! and trading parties.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use chrono::Utc;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{IntoParams, ToSchema};

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub event_sender: Arc<EventSender>,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DbPool>,
        config: Arc<AppConfig>,
        auth: Arc<AuthService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            auth,
            event_sender,
            services,
        }
    }

    /// Page number (1-based) and a page size clamped to the configured bounds
    pub fn paging(&self, query: &ListQuery) -> (u64, u64) {
        (query.page.max(1), self.config.page_size(query.limit))
    }
}

/// Common query parameters for list endpoints
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Page number, starting at 1
    #[serde(default = "default_page")]
    pub page: u64,
    /// Items per page; falls back to the configured default
    pub limit: Option<u64>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: None,
        }
    }
}

fn default_page() -> u64 {
    1
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn validation_errors_response_includes_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("meta-validation"),
            async { ApiResponse::<()>::validation_errors(vec!["missing".into()]) },
        )
        .await;

        assert!(!response.success);
        assert_eq!(response.errors.as_deref(), Some(&["missing".to_string()][..]));
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-validation"));
    }

    #[test]
    fn total_pages_rounds_up() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty = PaginatedResponse::<u8>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Multipart framing on top of the configured image size
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Routes mounted under `/api/v1`. Every group is gated by the permission it needs.
pub fn api_v1_routes(config: &AppConfig) -> Router<AppState> {
    let auth_public = Router::new().route("/auth/login", post(handlers::auth::login));
    let auth_session = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/change-password", post(handlers::auth::change_password))
        .with_auth();

    let dashboard = Router::new()
        .route("/dashboard/summary", get(handlers::dashboard::summary))
        .route("/dashboard/sales-trend", get(handlers::dashboard::sales_trend))
        .route("/dashboard/recent-orders", get(handlers::dashboard::recent_orders))
        .with_permission(perm::DASHBOARD_VIEW);

    // Orders
    let orders_view = Router::new()
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .with_permission(perm::ORDERS_VIEW);
    let orders_create = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .with_permission(perm::ORDERS_CREATE);
    let orders_edit = Router::new()
        .route("/orders/:id", put(handlers::orders::update_order))
        .route("/orders/:id/status", put(handlers::orders::update_order_status))
        .route("/orders/:id/payments", post(handlers::orders::record_payment))
        .with_permission(perm::ORDERS_EDIT);
    let orders_delete = Router::new()
        .route("/orders/:id", delete(handlers::orders::delete_order))
        .with_permission(perm::ORDERS_DELETE);

    // Products
    let products_view = Router::new()
        .route("/products", get(handlers::products::list_products))
        .route("/products/categories", get(handlers::products::list_categories))
        .route("/products/:id", get(handlers::products::get_product))
        .with_permission(perm::PRODUCTS_VIEW);
    let products_create = Router::new()
        .route("/products", post(handlers::products::create_product))
        .with_permission(perm::PRODUCTS_CREATE);
    let products_edit = Router::new()
        .route("/products/:id", put(handlers::products::update_product))
        .route(
            "/products/:id/image",
            post(handlers::products::upload_product_image).layer(DefaultBodyLimit::max(
                config.max_upload_bytes + UPLOAD_OVERHEAD_BYTES,
            )),
        )
        .with_permission(perm::PRODUCTS_EDIT);
    let products_delete = Router::new()
        .route("/products/:id", delete(handlers::products::delete_product))
        .with_permission(perm::PRODUCTS_DELETE);

    // Inventory
    let inventory_view = Router::new()
        .route("/inventory", get(handlers::inventory::list_inventory))
        .route("/inventory/low-stock", get(handlers::inventory::get_low_stock_items))
        .route("/inventory/:id", get(handlers::inventory::get_inventory))
        .route("/inventory/:id/movements", get(handlers::inventory::list_movements))
        .with_permission(perm::INVENTORY_VIEW);
    let inventory_create = Router::new()
        .route("/inventory", post(handlers::inventory::create_inventory))
        .with_permission(perm::INVENTORY_CREATE);
    let inventory_edit = Router::new()
        .route("/inventory/:id", put(handlers::inventory::update_inventory))
        .route("/inventory/:id/adjust", post(handlers::inventory::adjust_inventory))
        .with_permission(perm::INVENTORY_EDIT);
    let inventory_delete = Router::new()
        .route("/inventory/:id", delete(handlers::inventory::delete_inventory))
        .with_permission(perm::INVENTORY_DELETE);

    // Production
    let production_view = Router::new()
        .route("/production", get(handlers::production::list_production))
        .route("/production/today", get(handlers::production::production_today))
        .route("/production/:id", get(handlers::production::get_production))
        .with_permission(perm::PRODUCTION_VIEW);
    let production_create = Router::new()
        .route("/production", post(handlers::production::create_production))
        .with_permission(perm::PRODUCTION_CREATE);
    let production_edit = Router::new()
        .route("/production/:id", put(handlers::production::update_production))
        .route(
            "/production/:id/status",
            put(handlers::production::update_production_status),
        )
        .with_permission(perm::PRODUCTION_EDIT);
    let production_delete = Router::new()
        .route("/production/:id", delete(handlers::production::delete_production))
        .with_permission(perm::PRODUCTION_DELETE);

    // Customers
    let customers_view = Router::new()
        .route("/customers", get(handlers::customers::list_customers))
        .route("/customers/:id", get(handlers::customers::get_customer))
        .route("/customers/:id/orders", get(handlers::customers::customer_orders))
        .with_permission(perm::CUSTOMERS_VIEW);
    let customers_create = Router::new()
        .route("/customers", post(handlers::customers::create_customer))
        .with_permission(perm::CUSTOMERS_CREATE);
    let customers_edit = Router::new()
        .route("/customers/:id", put(handlers::customers::update_customer))
        .with_permission(perm::CUSTOMERS_EDIT);
    let customers_delete = Router::new()
        .route("/customers/:id", delete(handlers::customers::delete_customer))
        .with_permission(perm::CUSTOMERS_DELETE);

    // Parties
    let parties_view = Router::new()
        .route("/parties", get(handlers::parties::list_parties))
        .route("/parties/:id", get(handlers::parties::get_party))
        .with_permission(perm::PARTIES_VIEW);
    let parties_create = Router::new()
        .route("/parties", post(handlers::parties::create_party))
        .with_permission(perm::PARTIES_CREATE);
    let parties_edit = Router::new()
        .route("/parties/:id", put(handlers::parties::update_party))
        .with_permission(perm::PARTIES_EDIT);
    let parties_delete = Router::new()
        .route("/parties/:id", delete(handlers::parties::delete_party))
        .with_permission(perm::PARTIES_DELETE);

    // Ledger
    let ledger_view = Router::new()
        .route(
            "/ledger/customers/:id/statement",
            get(handlers::ledger::customer_statement),
        )
        .route("/ledger/parties/:id/statement", get(handlers::ledger::party_statement))
        .route("/ledger/transactions/:id", get(handlers::ledger::get_transaction))
        .with_permission(perm::LEDGER_VIEW);
    let ledger_create = Router::new()
        .route(
            "/ledger/customers/:id/transactions",
            post(handlers::ledger::post_customer_entry),
        )
        .route(
            "/ledger/parties/:id/transactions",
            post(handlers::ledger::post_party_entry),
        )
        .with_permission(perm::LEDGER_CREATE);
    let ledger_edit = Router::new()
        .route("/ledger/transactions/:id", put(handlers::ledger::update_transaction))
        .route(
            "/ledger/customers/:id/recalculate",
            post(handlers::ledger::recalculate_customer),
        )
        .route(
            "/ledger/parties/:id/recalculate",
            post(handlers::ledger::recalculate_party),
        )
        .with_permission(perm::LEDGER_EDIT);
    let ledger_delete = Router::new()
        .route(
            "/ledger/transactions/:id",
            delete(handlers::ledger::delete_transaction),
        )
        .with_permission(perm::LEDGER_DELETE);

    // Staff and attendance
    let staff_view = Router::new()
        .route("/staff", get(handlers::staff::list_staff))
        .route("/staff/attendance", get(handlers::staff::list_attendance))
        .route("/staff/:id", get(handlers::staff::get_staff))
        .with_permission(perm::STAFF_VIEW);
    let staff_create = Router::new()
        .route("/staff", post(handlers::staff::create_staff))
        .with_permission(perm::STAFF_CREATE);
    let staff_edit = Router::new()
        .route("/staff/:id", put(handlers::staff::update_staff))
        .route("/staff/attendance", post(handlers::staff::mark_attendance))
        .route("/staff/attendance/check-in", post(handlers::staff::check_in))
        .route("/staff/attendance/check-out", post(handlers::staff::check_out))
        .with_permission(perm::STAFF_EDIT);
    let staff_delete = Router::new()
        .route("/staff/:id", delete(handlers::staff::delete_staff))
        .with_permission(perm::STAFF_DELETE);
    let payroll = Router::new()
        .route("/staff/payroll", get(handlers::staff::payroll))
        .with_permission(perm::PAYROLL_VIEW);

    // Users, grants and audit trails
    let users_view = Router::new()
        .route("/users", get(handlers::users::list_users))
        .route("/users/:id", get(handlers::users::get_user))
        .route("/users/:id/permissions", get(handlers::permissions::get_user_permissions))
        .route(
            "/users/:id/effective-permissions",
            get(handlers::permissions::get_effective_permissions),
        )
        .route(
            "/roles/:role/permissions",
            get(handlers::permissions::get_role_permissions),
        )
        .route("/audit-logs", get(handlers::users::list_audit_logs))
        .route("/login-logs", get(handlers::users::list_login_logs))
        .with_permission(perm::USERS_VIEW);
    let users_create = Router::new()
        .route("/users", post(handlers::users::create_user))
        .with_permission(perm::USERS_CREATE);
    let users_edit = Router::new()
        .route("/users/:id", put(handlers::users::update_user))
        .route("/users/:id/reset-password", post(handlers::users::reset_password))
        .route("/users/:id/permissions", put(handlers::permissions::set_user_permissions))
        .route(
            "/roles/:role/permissions",
            put(handlers::permissions::set_role_permissions),
        )
        .with_permission(perm::USERS_EDIT);
    let users_delete = Router::new()
        .route("/users/:id", delete(handlers::users::delete_user))
        .with_permission(perm::USERS_DELETE);

    // Settings
    let settings_view = Router::new()
        .route("/settings", get(handlers::settings::get_settings))
        .route("/settings/:key", get(handlers::settings::get_setting))
        .with_permission(perm::SETTINGS_VIEW);
    let settings_edit = Router::new()
        .route(
            "/settings/:key",
            put(handlers::settings::put_setting).delete(handlers::settings::delete_setting),
        )
        .with_permission(perm::SETTINGS_EDIT);

    // Notifications are visible to every signed-in user
    let notifications = Router::new()
        .route("/notifications", get(handlers::notifications::list_notifications))
        .route(
            "/notifications/unread-count",
            get(handlers::notifications::unread_count),
        )
        .route("/notifications/read-all", post(handlers::notifications::mark_all_read))
        .route("/notifications/:id/read", post(handlers::notifications::mark_read))
        .route(
            "/notifications/:id",
            delete(handlers::notifications::delete_notification),
        )
        .with_auth();

    Router::new()
        .route("/status", get(api_status))
        .merge(auth_public)
        .merge(auth_session)
        .merge(dashboard)
        .merge(orders_view)
        .merge(orders_create)
        .merge(orders_edit)
        .merge(orders_delete)
        .merge(products_view)
        .merge(products_create)
        .merge(products_edit)
        .merge(products_delete)
        .merge(inventory_view)
        .merge(inventory_create)
        .merge(inventory_edit)
        .merge(inventory_delete)
        .merge(production_view)
        .merge(production_create)
        .merge(production_edit)
        .merge(production_delete)
        .merge(customers_view)
        .merge(customers_create)
        .merge(customers_edit)
        .merge(customers_delete)
        .merge(parties_view)
        .merge(parties_create)
        .merge(parties_edit)
        .merge(parties_delete)
        .merge(ledger_view)
        .merge(ledger_create)
        .merge(ledger_edit)
        .merge(ledger_delete)
        .merge(staff_view)
        .merge(staff_create)
        .merge(staff_edit)
        .merge(staff_delete)
        .merge(payroll)
        .merge(users_view)
        .merge(users_create)
        .merge(users_edit)
        .merge(users_delete)
        .merge(settings_view)
        .merge(settings_edit)
        .merge(notifications)
}

/// The complete HTTP application: API, health checks, docs, uploaded files and
/// the middleware stack.
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = api_v1_routes(&config).with_state(state.clone());

    Router::new()
        .nest("/api/v1", api)
        .nest("/health", health::health_routes(state.db.clone()))
        .merge(openapi::swagger_ui())
        .nest_service("/uploads", ServeDir::new(&config.uploads_dir))
        .layer(axum::middleware::from_fn(request_metrics_middleware))
        .layer(Extension(state.auth.clone()))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&config))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http().make_span_with(crate::tracing::RequestSpanMaker))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() && config.is_development() {
        base.allow_origin(Any)
    } else {
        // Credentials let the browser send the session cookie
        base.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

async fn api_status(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> ApiResult<Value> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
        "service": env!("CARGO_PKG_NAME"),
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.config.environment,
    });

    Ok(Json(ApiResponse::success(status_data)))
}

// Request counters and latency, labelled by method and status
async fn request_metrics_middleware(
    request: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = request.method().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    counter!("bakery_http_requests", 1, "method" => method.to_string(), "status" => status);
    histogram!("bakery_http_request_seconds", start.elapsed(), "method" => method.to_string());
    response
}
