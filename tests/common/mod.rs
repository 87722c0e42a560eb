#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use bakery_api::{
    auth::{AuthConfig, AuthService},
    build_router,
    config::AppConfig,
    db,
    entities::user,
    events::{self, EventSender},
    services::{permissions::PermissionService, users::CreateUserRequest},
    AppState,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_PASSWORD: &str = "admin-pass-123";

/// Application wired like the real server, backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin: user::Model,
    token: String,
    _uploads: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build an app after letting the caller tweak the configuration
    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let uploads = TempDir::new().expect("temp uploads dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_bakery_api_tests_0123456789".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.uploads_dir = uploads.path().to_string_lossy().into_owned();
        tweak(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = EventSender::channel(cfg.event_channel_capacity);
        let auth_service = Arc::new(AuthService::new(AuthConfig::from(&cfg)));
        let state = AppState::new(
            Arc::new(pool),
            Arc::new(cfg),
            auth_service,
            Arc::new(event_sender),
        );
        let event_task = tokio::spawn(events::process_events(
            event_rx,
            state.services.notifications.clone(),
        ));

        let admin = state
            .services
            .users
            .create(CreateUserRequest {
                username: "owner".to_string(),
                email: "owner@bakery.test".to_string(),
                full_name: "Shop Owner".to_string(),
                password: ADMIN_PASSWORD.to_string(),
                role: "admin".to_string(),
            })
            .await
            .expect("seed admin user");
        let token = state
            .auth
            .generate_token(&admin, Vec::new())
            .expect("admin token")
            .access_token;

        let router = build_router(state.clone());

        Self {
            router,
            state,
            admin,
            token,
            _uploads: uploads,
            _event_task: event_task,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Create a user with a built-in role and return it with a token carrying
    /// the role's resolved permissions.
    pub async fn user_with_role(&self, username: &str, role: &str) -> (user::Model, String) {
        let user = self
            .state
            .services
            .users
            .create(CreateUserRequest {
                username: username.to_string(),
                email: format!("{username}@bakery.test"),
                full_name: username.to_string(),
                password: "staff-pass-123".to_string(),
                role: role.to_string(),
            })
            .await
            .expect("seed user");
        let token = self.token_for(&user).await;
        (user, token)
    }

    /// Issue a token with the user's current effective permissions
    pub async fn token_for(&self, user: &user::Model) -> String {
        let effective = PermissionService::effective_for(&*self.state.db, user)
            .await
            .expect("resolve permissions");
        self.state
            .auth
            .generate_token(user, effective.permissions)
            .expect("token")
            .access_token
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("build request")).await
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.request(Method::GET, uri, None, Some(self.token())).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> Response {
        self.request(Method::POST, uri, Some(body), Some(self.token()))
            .await
    }

    pub async fn put(&self, uri: &str, body: Value) -> Response {
        self.request(Method::PUT, uri, Some(body), Some(self.token()))
            .await
    }

    pub async fn delete(&self, uri: &str) -> Response {
        self.request(Method::DELETE, uri, None, Some(self.token()))
            .await
    }

    /// POST and return `data` from a response with the expected status
    pub async fn create(&self, uri: &str, body: Value) -> Value {
        let response = self.post(uri, body).await;
        let status = response.status();
        let json = response_json(response).await;
        assert!(
            status == StatusCode::CREATED || status == StatusCode::OK,
            "POST {uri} returned {status}: {json}"
        );
        json["data"].clone()
    }

    pub async fn seed_product(&self, sku: &str, price: &str) -> Value {
        self.create(
            "/api/v1/products",
            json!({
                "name": format!("Product {sku}"),
                "sku": sku,
                "category": "bread",
                "unit": "piece",
                "price": price,
                "cost": "0",
            }),
        )
        .await
    }

    pub async fn seed_customer(&self, name: &str, opening_balance: &str) -> Value {
        self.create(
            "/api/v1/customers",
            json!({ "name": name, "opening_balance": opening_balance }),
        )
        .await
    }

    pub async fn seed_party(&self, name: &str, opening_balance: &str) -> Value {
        self.create(
            "/api/v1/parties",
            json!({ "name": name, "opening_balance": opening_balance }),
        )
        .await
    }

    pub async fn seed_staff(&self, name: &str, salary_type: &str, amount: &str) -> Value {
        self.create(
            "/api/v1/staff",
            json!({
                "name": name,
                "position": "Baker",
                "salary_type": salary_type,
                "salary_amount": amount,
                "join_date": "2024-01-01",
            }),
        )
        .await
    }

    /// Wait for the event processor to catch up
    pub async fn settle(&self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Decimals serialize as strings; compare them numerically
pub fn dec(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

pub fn id_of(value: &Value) -> Uuid {
    Uuid::parse_str(value["id"].as_str().expect("id field")).expect("uuid")
}
