//! Settings with defaults, the dashboard summary and the notification feed cap.

mod common;

use axum::http::StatusCode;
use bakery_api::{
    entities::notification::{self, NotificationKind},
    services::notifications::NewNotification,
};
use chrono::Utc;
use common::{dec, response_json, TestApp};
use rust_decimal_macros::dec as d;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use std::time::Duration;

async fn setting(app: &TestApp, key: &str) -> (StatusCode, Value) {
    let response = app.get(&format!("/api/v1/settings/{key}")).await;
    let status = response.status();
    (status, response_json(response).await)
}

#[tokio::test]
async fn unset_settings_fall_back_to_defaults() {
    let app = TestApp::new().await;

    let all = response_json(app.get("/api/v1/settings").await).await;
    assert_eq!(all["data"]["business_name"], "My Bakery");
    assert_eq!(all["data"]["currency"], "INR");
    assert_eq!(all["data"]["tax_rate"], 0);
    assert_eq!(all["data"]["low_stock_alerts"], true);

    let (status, body) = setting(&app, "currency").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "INR");

    let (status, _) = setting(&app, "never_set").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stored_settings_override_until_deleted() {
    let app = TestApp::new().await;

    let saved = app
        .put("/api/v1/settings/tax_rate", json!({ "value": 5.5 }))
        .await;
    assert_eq!(saved.status(), StatusCode::OK);
    let saved = response_json(saved).await;
    assert_eq!(saved["data"]["key"], "tax_rate");
    assert_eq!(saved["data"]["value"], 5.5);
    assert_eq!(saved["data"]["updated_by"], json!(app.admin.id));

    let (_, body) = setting(&app, "tax_rate").await;
    assert_eq!(body["data"], 5.5);

    // Free-form keys keep whatever JSON they are given
    let footer = json!({ "line": "Thank you", "show_logo": false });
    let stored = app
        .put("/api/v1/settings/receipt.footer", json!({ "value": footer }))
        .await;
    assert_eq!(stored.status(), StatusCode::OK);
    let all = response_json(app.get("/api/v1/settings").await).await;
    assert_eq!(all["data"]["receipt.footer"], footer);
    assert_eq!(all["data"]["tax_rate"], 5.5);
    assert_eq!(all["data"]["business_name"], "My Bakery");

    let removed = app.delete("/api/v1/settings/tax_rate").await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    let (_, body) = setting(&app, "tax_rate").await;
    assert_eq!(body["data"], 0);

    let again = app.delete("/api/v1/settings/tax_rate").await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn bad_keys_and_mistyped_values_are_rejected() {
    let app = TestApp::new().await;

    for key in ["Business-Name", "9lives", "tax%20rate"] {
        let response = app
            .put(&format!("/api/v1/settings/{key}"), json!({ "value": "x" }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "key {key}");
    }
    let (status, _) = setting(&app, "Business-Name").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let out_of_range = app
        .put("/api/v1/settings/tax_rate", json!({ "value": 150 }))
        .await;
    assert_eq!(out_of_range.status(), StatusCode::BAD_REQUEST);
    let wrong_type = app
        .put("/api/v1/settings/low_stock_alerts", json!({ "value": "yes" }))
        .await;
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);
    let blank = app
        .put("/api/v1/settings/business_name", json!({ "value": "  " }))
        .await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    // Nothing was stored by the failed writes
    let all = response_json(app.get("/api/v1/settings").await).await;
    assert_eq!(all["data"].as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn dashboard_summarises_today() {
    let app = TestApp::new().await;
    let today = Utc::now().date_naive().to_string();

    let bread = app.seed_product("DASH-BRD", "40").await;
    let customer = app.seed_customer("Corner Cafe", "100").await;
    app.seed_customer("Prepaid Club", "-50").await;
    app.seed_party("Mill", "200").await;

    let order = app
        .create(
            "/api/v1/orders",
            json!({
                "customer_id": customer["id"],
                "items": [{ "product_id": bread["id"], "quantity": "3" }]
            }),
        )
        .await;
    assert_eq!(dec(&order["total_amount"]), d!(120));

    app.create(
        "/api/v1/inventory",
        json!({
            "name": "Yeast",
            "sku": "ING-YEAST",
            "category": "ingredient",
            "unit": "kg",
            "quantity": "2",
            "reorder_level": "5",
            "unit_cost": "3"
        }),
    )
    .await;
    app.create(
        "/api/v1/inventory",
        json!({
            "name": "Salt",
            "sku": "ING-SALT",
            "category": "ingredient",
            "unit": "kg",
            "quantity": "40",
            "reorder_level": "5",
            "unit_cost": "1"
        }),
    )
    .await;
    app.create(
        "/api/v1/production",
        json!({
            "product_id": bread["id"],
            "quantity": "50",
            "scheduled_date": today
        }),
    )
    .await;

    let response = app.get("/api/v1/dashboard/summary").await;
    assert_eq!(response.status(), StatusCode::OK);
    let summary = response_json(response).await["data"].clone();
    assert_eq!(summary["date"], today);
    assert_eq!(summary["orders_today"], 1);
    assert_eq!(dec(&summary["revenue_today"]), d!(120));
    assert_eq!(summary["pending_orders"], 1);
    assert_eq!(summary["low_stock_items"], 1);
    assert_eq!(summary["production_planned_today"], 1);
    assert_eq!(summary["production_completed_today"], 0);
    assert_eq!(summary["staff_present_today"], 0);
    // Opening 100 plus the unpaid order; credit balances are left out
    assert_eq!(dec(&summary["receivables"]), d!(220));
    assert_eq!(dec(&summary["payables"]), d!(200));
}

#[tokio::test]
async fn dashboard_needs_a_signed_in_user() {
    let app = TestApp::new().await;
    let response = app
        .request(
            axum::http::Method::GET,
            "/api/v1/dashboard/summary",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn notification_feed_keeps_only_the_newest() {
    let app = TestApp::with_config(|c| c.notification_retention = 3).await;

    for n in 1..=5 {
        app.state
            .services
            .notifications
            .push(NewNotification {
                title: format!("Batch {n} ready"),
                message: format!("Batch {n} finished baking"),
                kind: NotificationKind::Production,
            })
            .await
            .unwrap();
        // Distinct timestamps keep the newest-first order stable
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let stored = notification::Entity::find()
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(stored, 3);

    let feed = response_json(app.get("/api/v1/notifications").await).await;
    let titles: Vec<&str> = feed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Batch 5 ready", "Batch 4 ready", "Batch 3 ready"]);

    let unread = response_json(app.get("/api/v1/notifications/unread-count").await).await;
    assert_eq!(unread["data"]["unread"], 3);
}
