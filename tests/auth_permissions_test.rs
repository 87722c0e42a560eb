//! Login, sessions and permission gating through the HTTP stack.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{response_json, TestApp, ADMIN_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn login_returns_token_cookie_and_permissions() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "owner", "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("session cookie")
        .to_string();
    assert!(cookie.contains("HttpOnly"));

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["username"], "owner");
    assert!(body["data"].get("password_hash").is_none());
    assert!(body["data"]["user"].get("password_hash").is_none());

    // The cookie alone authenticates
    let token_pair = cookie.split(';').next().unwrap().to_string();
    let me = app
        .send(
            Request::builder()
                .uri("/api/v1/auth/me")
                .header(header::COOKIE, token_pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = response_json(me).await;
    assert_eq!(me["data"]["user"]["role"], "admin");
}

#[tokio::test]
async fn email_works_as_login_name() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "owner@bakery.test", "password": ADMIN_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_login_is_rejected_and_logged() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "owner", "password": "wrong-password" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let logs = response_json(app.get("/api/v1/login-logs").await).await;
    let items = logs["data"]["items"].as_array().expect("login log page");
    assert!(items
        .iter()
        .any(|row| row["username"] == "owner" && row["success"] == false));
}

#[tokio::test]
async fn disabled_account_cannot_log_in() {
    let app = TestApp::new().await;
    let (user, _) = app.user_with_role("sam", "cashier").await;

    let response = app
        .put(
            &format!("/api/v1/users/{}", user.id),
            json!({ "is_active": false }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let login = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            Some(json!({ "username": "sam", "password": "staff-pass-123" })),
            None,
        )
        .await;
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let (_, token) = app.user_with_role("lee", "manager").await;

    let me = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(me.status(), StatusCode::OK);

    let logout = app
        .request(Method::POST, "/api/v1/auth/logout", None, Some(&token))
        .await;
    assert_eq!(logout.status(), StatusCode::OK);

    let again = app
        .request(Method::GET, "/api/v1/auth/me", None, Some(&token))
        .await;
    assert_eq!(again.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_garbage_token_is_unauthorized() {
    let app = TestApp::new().await;

    let none = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(none.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(Method::GET, "/api/v1/orders", None, Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_grants_gate_routes() {
    let app = TestApp::new().await;
    let (_, cashier) = app.user_with_role("cara", "cashier").await;
    let (_, baker) = app.user_with_role("ben", "baker").await;

    let list = app
        .request(Method::GET, "/api/v1/orders", None, Some(&cashier))
        .await;
    assert_eq!(list.status(), StatusCode::OK);

    // Cashiers take orders but never see payroll or user admin
    let payroll = app
        .request(Method::GET, "/api/v1/staff/payroll", None, Some(&cashier))
        .await;
    assert_eq!(payroll.status(), StatusCode::FORBIDDEN);
    let users = app
        .request(Method::GET, "/api/v1/users", None, Some(&cashier))
        .await;
    assert_eq!(users.status(), StatusCode::FORBIDDEN);

    // Bakers read orders but cannot create them
    let create = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({ "customer_name": "Walk-in", "items": [] })),
            Some(&baker),
        )
        .await;
    assert_eq!(create.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn user_grant_overrides_role_grant() {
    let app = TestApp::new().await;
    let (user, token) = app.user_with_role("bea", "baker").await;

    let before = app
        .request(Method::GET, "/api/v1/customers", None, Some(&token))
        .await;
    assert_eq!(before.status(), StatusCode::FORBIDDEN);

    let grant = app
        .put(
            &format!("/api/v1/users/{}/permissions", user.id),
            json!([{
                "module": "customers",
                "can_view": true,
                "can_create": false,
                "can_edit": false,
                "can_delete": false
            }]),
        )
        .await;
    assert_eq!(grant.status(), StatusCode::OK);

    let effective = response_json(
        app.get(&format!("/api/v1/users/{}/effective-permissions", user.id))
            .await,
    )
    .await;
    let perms: Vec<String> = serde_json::from_value(effective["data"]["permissions"].clone()).unwrap();
    assert!(perms.contains(&"customers:view".to_string()));
    assert!(perms.contains(&"production:create".to_string()));

    // Permissions travel in the token, so a fresh one picks up the grant
    let fresh = app.token_for(&user).await;
    let after = app
        .request(Method::GET, "/api/v1/customers", None, Some(&fresh))
        .await;
    assert_eq!(after.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_cannot_delete_own_account() {
    let app = TestApp::new().await;
    let response = app
        .delete(&format!("/api/v1/users/{}", app.admin.id))
        .await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn mutating_admin_actions_are_audited() {
    let app = TestApp::new().await;
    app.create(
        "/api/v1/users",
        json!({
            "username": "newhire",
            "email": "newhire@bakery.test",
            "full_name": "New Hire",
            "password": "long-enough-pw",
            "role": "baker"
        }),
    )
    .await;
    app.put("/api/v1/settings/business_name", json!({ "value": "Corner Bakery" }))
        .await;

    let logs = response_json(app.get("/api/v1/audit-logs").await).await;
    let items = logs["data"]["items"].as_array().unwrap();
    assert!(items
        .iter()
        .any(|row| row["entity_type"] == "user" && row["action"] == "create"));
    assert!(items
        .iter()
        .any(|row| row["entity_type"] == "setting" && row["action"] == "update"));
}
