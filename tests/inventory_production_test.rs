//! Stock adjustments, low-stock alerts and production completing into stock.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{dec, response_json, TestApp};
use rust_decimal_macros::dec as d;
use serde_json::{json, Value};

async fn seed_item(app: &TestApp, body: Value) -> Value {
    app.create("/api/v1/inventory", body).await
}

#[tokio::test]
async fn adjustments_move_stock_and_refuse_to_go_negative() {
    let app = TestApp::new().await;
    let flour = seed_item(
        &app,
        json!({
            "name": "Wheat Flour",
            "sku": "ING-FLOUR",
            "category": "ingredient",
            "unit": "kg",
            "quantity": "50",
            "reorder_level": "10",
            "unit_cost": "1.20"
        }),
    )
    .await;
    let flour_id = flour["id"].as_str().unwrap().to_string();

    let used = app
        .post(
            &format!("/api/v1/inventory/{flour_id}/adjust"),
            json!({ "delta": "-12.5", "reason": "usage" }),
        )
        .await;
    assert_eq!(used.status(), StatusCode::OK);
    let used = response_json(used).await;
    assert_eq!(dec(&used["data"]["item"]["quantity"]), d!(37.5));
    assert_eq!(dec(&used["data"]["movement"]["delta"]), d!(-12.5));

    let too_much = app
        .post(
            &format!("/api/v1/inventory/{flour_id}/adjust"),
            json!({ "delta": "-40", "reason": "usage" }),
        )
        .await;
    assert_eq!(too_much.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let zero = app
        .post(
            &format!("/api/v1/inventory/{flour_id}/adjust"),
            json!({ "delta": "0", "reason": "noop" }),
        )
        .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    // Quantity only changes through adjustments
    let direct = app
        .put(
            &format!("/api/v1/inventory/{flour_id}"),
            json!({ "quantity": "999" }),
        )
        .await;
    assert_eq!(direct.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let movements = response_json(
        app.get(&format!("/api/v1/inventory/{flour_id}/movements"))
            .await,
    )
    .await;
    // Opening stock plus the one accepted adjustment
    assert_eq!(movements["data"]["total"], 2);
}

#[tokio::test]
async fn crossing_reorder_level_raises_one_notification() {
    let app = TestApp::new().await;
    let sugar = seed_item(
        &app,
        json!({
            "name": "Sugar",
            "sku": "ING-SUGAR",
            "category": "ingredient",
            "unit": "kg",
            "quantity": "20",
            "reorder_level": "5"
        }),
    )
    .await;
    let sugar_id = sugar["id"].as_str().unwrap().to_string();

    app.post(
        &format!("/api/v1/inventory/{sugar_id}/adjust"),
        json!({ "delta": "-16", "reason": "usage" }),
    )
    .await;
    // Already low; no second alert
    app.post(
        &format!("/api/v1/inventory/{sugar_id}/adjust"),
        json!({ "delta": "-1", "reason": "usage" }),
    )
    .await;
    app.settle().await;

    let feed = response_json(app.get("/api/v1/notifications").await).await;
    let low: Vec<&Value> = feed["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["kind"] == "inventory")
        .collect();
    assert_eq!(low.len(), 1);
    assert!(low[0]["title"].as_str().unwrap().contains("Sugar"));

    let low_stock = response_json(app.get("/api/v1/inventory/low-stock").await).await;
    let items = low_stock["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(dec(&items[0]["quantity"]), d!(3));

    let unread = response_json(app.get("/api/v1/notifications/unread-count").await).await;
    assert_eq!(unread["data"]["unread"], 1);

    let marked = app.post("/api/v1/notifications/read-all", json!({})).await;
    assert_eq!(marked.status(), StatusCode::OK);
    let unread = response_json(app.get("/api/v1/notifications/unread-count").await).await;
    assert_eq!(unread["data"]["unread"], 0);
}

#[tokio::test]
async fn completing_production_adds_finished_goods() {
    let app = TestApp::new().await;
    let loaf = app.seed_product("LOAF-W", "45").await;
    let shelf = seed_item(
        &app,
        json!({
            "name": "White Loaf (shelf)",
            "sku": "FG-LOAF-W",
            "category": "finished_good",
            "unit": "piece",
            "quantity": "5",
            "product_id": loaf["id"]
        }),
    )
    .await;
    let baker = app.seed_staff("Rina", "daily", "800").await;
    let today = Utc::now().date_naive().to_string();

    let batch = app
        .create(
            "/api/v1/production",
            json!({
                "product_id": loaf["id"],
                "quantity": "40",
                "scheduled_date": today,
                "assigned_to": baker["id"]
            }),
        )
        .await;
    assert_eq!(batch["status"], "planned");
    let batch_id = batch["id"].as_str().unwrap().to_string();

    let started = app
        .put(
            &format!("/api/v1/production/{batch_id}/status"),
            json!({ "status": "in_progress" }),
        )
        .await;
    assert_eq!(started.status(), StatusCode::OK);

    let done = app
        .put(
            &format!("/api/v1/production/{batch_id}/status"),
            json!({ "status": "completed" }),
        )
        .await;
    assert_eq!(done.status(), StatusCode::OK);
    let done = response_json(done).await;
    assert!(done["data"]["completed_at"].is_string());

    let stock = response_json(
        app.get(&format!(
            "/api/v1/inventory/{}",
            shelf["id"].as_str().unwrap()
        ))
        .await,
    )
    .await;
    assert_eq!(dec(&stock["data"]["quantity"]), d!(45));

    let todays = response_json(app.get("/api/v1/production/today").await).await;
    assert_eq!(todays["data"].as_array().unwrap().len(), 1);

    // Completed batches are history
    let reopen = app
        .put(
            &format!("/api/v1/production/{batch_id}/status"),
            json!({ "status": "in_progress" }),
        )
        .await;
    assert_eq!(reopen.status(), StatusCode::BAD_REQUEST);
    let delete = app.delete(&format!("/api/v1/production/{batch_id}")).await;
    assert_eq!(delete.status(), StatusCode::BAD_REQUEST);

    app.settle().await;
    let feed = response_json(app.get("/api/v1/notifications").await).await;
    assert!(feed["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["kind"] == "production"));
}

#[tokio::test]
async fn cancelled_batch_leaves_stock_alone() {
    let app = TestApp::new().await;
    let bun = app.seed_product("BUN-1", "12").await;
    let shelf = seed_item(
        &app,
        json!({
            "name": "Buns (shelf)",
            "sku": "FG-BUN",
            "category": "finished_good",
            "unit": "piece",
            "product_id": bun["id"]
        }),
    )
    .await;

    let batch = app
        .create(
            "/api/v1/production",
            json!({
                "product_id": bun["id"],
                "quantity": "24",
                "scheduled_date": "2024-09-01"
            }),
        )
        .await;
    let batch_id = batch["id"].as_str().unwrap().to_string();

    let cancelled = app
        .put(
            &format!("/api/v1/production/{batch_id}/status"),
            json!({ "status": "cancelled" }),
        )
        .await;
    assert_eq!(cancelled.status(), StatusCode::OK);

    let complete = app
        .put(
            &format!("/api/v1/production/{batch_id}/status"),
            json!({ "status": "completed" }),
        )
        .await;
    assert_eq!(complete.status(), StatusCode::BAD_REQUEST);

    let stock = response_json(
        app.get(&format!(
            "/api/v1/inventory/{}",
            shelf["id"].as_str().unwrap()
        ))
        .await,
    )
    .await;
    assert_eq!(dec(&stock["data"]["quantity"]), d!(0));
}

#[tokio::test]
async fn referenced_product_cannot_be_deleted() {
    let app = TestApp::new().await;
    let cake = app.seed_product("CAKE-R", "300").await;
    let unused = app.seed_product("CAKE-U", "300").await;

    app.create(
        "/api/v1/production",
        json!({
            "product_id": cake["id"],
            "quantity": "2",
            "scheduled_date": "2024-09-02"
        }),
    )
    .await;

    let refused = app
        .delete(&format!("/api/v1/products/{}", cake["id"].as_str().unwrap()))
        .await;
    assert_eq!(refused.status(), StatusCode::CONFLICT);

    let removed = app
        .delete(&format!("/api/v1/products/{}", unused["id"].as_str().unwrap()))
        .await;
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn duplicate_skus_conflict() {
    let app = TestApp::new().await;
    app.seed_product("DUP-1", "10").await;
    let again = app
        .post(
            "/api/v1/products",
            json!({
                "name": "Another",
                "sku": "DUP-1",
                "category": "bread",
                "unit": "piece",
                "price": "10",
                "cost": "0"
            }),
        )
        .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let bad_sku = app
        .post(
            "/api/v1/products",
            json!({
                "name": "Spaces",
                "sku": "has spaces",
                "category": "bread",
                "unit": "piece",
                "price": "10",
                "cost": "0"
            }),
        )
        .await;
    assert_eq!(bad_sku.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_withdrawals_cannot_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("stock.db").display());
    let app = TestApp::with_config(|c| {
        c.database_url = url;
        c.db_max_connections = 4;
    })
    .await;
    let butter = seed_item(
        &app,
        json!({
            "name": "Butter",
            "sku": "ING-BUTTER",
            "category": "ingredient",
            "unit": "kg",
            "quantity": "50",
            "reorder_level": "5",
            "unit_cost": "8"
        }),
    )
    .await;
    let adjust_uri = format!("/api/v1/inventory/{}/adjust", butter["id"].as_str().unwrap());

    let body = json!({ "delta": "-30", "reason": "usage" });
    let (first, second) = tokio::join!(
        app.post(&adjust_uri, body.clone()),
        app.post(&adjust_uri, body.clone())
    );
    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();
    assert_eq!(
        statuses,
        vec![StatusCode::OK, StatusCode::UNPROCESSABLE_ENTITY]
    );

    let item = response_json(
        app.get(&format!("/api/v1/inventory/{}", butter["id"].as_str().unwrap()))
            .await,
    )
    .await;
    assert_eq!(dec(&item["data"]["quantity"]), d!(20));

    let movements = response_json(
        app.get(&format!(
            "/api/v1/inventory/{}/movements",
            butter["id"].as_str().unwrap()
        ))
        .await,
    )
    .await;
    let withdrawals = movements["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| dec(&m["delta"]) < d!(0))
        .count();
    assert_eq!(withdrawals, 1);
}
