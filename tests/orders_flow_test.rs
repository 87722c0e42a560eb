//! Order lifecycle: pricing, payments, status changes and the customer ledger.

mod common;

use axum::http::StatusCode;
use common::{dec, id_of, response_json, TestApp};
use rust_decimal_macros::dec as d;
use serde_json::{json, Value};

async fn customer_balance(app: &TestApp, customer_id: &str) -> rust_decimal::Decimal {
    let body = response_json(app.get(&format!("/api/v1/customers/{customer_id}")).await).await;
    dec(&body["data"]["current_balance"])
}

async fn statement(app: &TestApp, customer_id: &str) -> Value {
    let body = response_json(
        app.get(&format!("/api/v1/ledger/customers/{customer_id}/statement"))
            .await,
    )
    .await;
    body["data"].clone()
}

async fn set_status(app: &TestApp, order_id: &str, status: &str) -> axum::response::Response {
    app.put(
        &format!("/api/v1/orders/{order_id}/status"),
        json!({ "status": status }),
    )
    .await
}

#[tokio::test]
async fn order_prices_lines_and_posts_to_customer_ledger() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-1", "40.00").await;
    let cake = app.seed_product("CAKE-1", "250.50").await;
    let customer = app.seed_customer("Hotel Sunrise", "100").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let order = app
        .create(
            "/api/v1/orders",
            json!({
                "customer_id": customer_id,
                "items": [
                    { "product_id": bread["id"], "quantity": "3" },
                    { "product_id": cake["id"], "quantity": "1", "unit_price": "240" }
                ],
                "initial_payment": "60"
            }),
        )
        .await;

    assert_eq!(order["status"], "pending");
    assert_eq!(order["customer_name"], "Hotel Sunrise");
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD-"));
    assert_eq!(dec(&order["total_amount"]), d!(360));
    assert_eq!(dec(&order["amount_paid"]), d!(60));
    assert_eq!(order["payment_status"], "partial");
    assert_eq!(order["items"].as_array().unwrap().len(), 2);
    assert_eq!(order["payments"].as_array().unwrap().len(), 1);

    // Opening 100 + order 360 - advance 60
    assert_eq!(customer_balance(&app, &customer_id).await, d!(400));

    let stmt = statement(&app, &customer_id).await;
    let rows = stmt["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(dec(&rows[0]["debit"]), d!(360));
    assert_eq!(dec(&rows[0]["balance"]), d!(460));
    assert_eq!(dec(&rows[1]["credit"]), d!(60));
    assert_eq!(dec(&rows[1]["balance"]), d!(400));
    assert!(rows.iter().all(|r| r["order_id"] == order["id"]));
    assert_eq!(dec(&stmt["closing_balance"]), d!(400));
}

#[tokio::test]
async fn payments_settle_the_order_and_reject_overpayment() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-2", "25").await;
    let customer = app.seed_customer("Cafe Corner", "0").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let order = app
        .create(
            "/api/v1/orders",
            json!({
                "customer_id": customer_id,
                "items": [{ "product_id": bread["id"], "quantity": "4" }]
            }),
        )
        .await;
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(order["payment_status"], "unpaid");

    let over = app
        .post(
            &format!("/api/v1/orders/{order_id}/payments"),
            json!({ "amount": "150" }),
        )
        .await;
    assert_eq!(over.status(), StatusCode::BAD_REQUEST);

    let zero = app
        .post(
            &format!("/api/v1/orders/{order_id}/payments"),
            json!({ "amount": "0" }),
        )
        .await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);

    let partial = app
        .post(
            &format!("/api/v1/orders/{order_id}/payments"),
            json!({ "amount": "40", "note": "cash" }),
        )
        .await;
    assert_eq!(partial.status(), StatusCode::OK);
    let partial = response_json(partial).await;
    assert_eq!(partial["data"]["payment_status"], "partial");

    let rest = response_json(
        app.post(
            &format!("/api/v1/orders/{order_id}/payments"),
            json!({ "amount": "60" }),
        )
        .await,
    )
    .await;
    assert_eq!(rest["data"]["payment_status"], "paid");
    assert_eq!(dec(&rest["data"]["amount_paid"]), d!(100));
    assert_eq!(rest["data"]["payments"].as_array().unwrap().len(), 2);

    assert_eq!(customer_balance(&app, &customer_id).await, d!(0));
}

#[tokio::test]
async fn status_follows_the_order_lifecycle() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-3", "10").await;
    let order = app
        .create(
            "/api/v1/orders",
            json!({
                "customer_name": "Walk-in Guest",
                "items": [{ "product_id": bread["id"], "quantity": "2" }]
            }),
        )
        .await;
    let order_id = order["id"].as_str().unwrap().to_string();

    // Cannot skip straight to delivered
    let skip = set_status(&app, &order_id, "delivered").await;
    assert_eq!(skip.status(), StatusCode::BAD_REQUEST);

    for next in ["confirmed", "in_production", "ready", "delivered"] {
        let response = set_status(&app, &order_id, next).await;
        assert_eq!(response.status(), StatusCode::OK, "moving to {next}");
        let body = response_json(response).await;
        assert_eq!(body["data"]["status"], next);
    }

    // Delivered is terminal
    let cancel = set_status(&app, &order_id, "cancelled").await;
    assert_eq!(cancel.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancelling_credits_the_unpaid_remainder() {
    let app = TestApp::new().await;
    let cake = app.seed_product("CAKE-2", "500").await;
    let customer = app.seed_customer("Wedding Party", "0").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let order = app
        .create(
            "/api/v1/orders",
            json!({
                "customer_id": customer_id,
                "items": [{ "product_id": cake["id"], "quantity": "1" }],
                "initial_payment": "200"
            }),
        )
        .await;
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(customer_balance(&app, &customer_id).await, d!(300));

    set_status(&app, &order_id, "confirmed").await;
    let cancelled = set_status(&app, &order_id, "cancelled").await;
    assert_eq!(cancelled.status(), StatusCode::OK);

    // The advance stays with the shop; the customer no longer owes the rest
    assert_eq!(customer_balance(&app, &customer_id).await, d!(0));
    let stmt = statement(&app, &customer_id).await;
    let last = stmt["transactions"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(dec(&last["credit"]), d!(300));

    let pay = app
        .post(
            &format!("/api/v1/orders/{order_id}/payments"),
            json!({ "amount": "10" }),
        )
        .await;
    assert_eq!(pay.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_pending_or_cancelled_orders_can_be_deleted() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-4", "30").await;
    let customer = app.seed_customer("Office Canteen", "50").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let new_order = |qty: &'static str| {
        json!({
            "customer_id": customer_id,
            "items": [{ "product_id": bread["id"], "quantity": qty }]
        })
    };
    let confirmed = app.create("/api/v1/orders", new_order("1")).await;
    let pending = app.create("/api/v1/orders", new_order("2")).await;
    assert_eq!(customer_balance(&app, &customer_id).await, d!(140));

    let confirmed_id = id_of(&confirmed);
    set_status(&app, &confirmed_id.to_string(), "confirmed").await;
    let refused = app.delete(&format!("/api/v1/orders/{confirmed_id}")).await;
    assert_eq!(refused.status(), StatusCode::BAD_REQUEST);

    let pending_id = id_of(&pending);
    let deleted = app.delete(&format!("/api/v1/orders/{pending_id}")).await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let gone = app.get(&format!("/api/v1/orders/{pending_id}")).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // Its ledger rows go with it
    assert_eq!(customer_balance(&app, &customer_id).await, d!(80));
    let stmt = statement(&app, &customer_id).await;
    assert_eq!(stmt["transactions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn walk_in_order_needs_a_name_and_items() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-5", "10").await;

    let nameless = app
        .post(
            "/api/v1/orders",
            json!({ "items": [{ "product_id": bread["id"], "quantity": "1" }] }),
        )
        .await;
    assert_eq!(nameless.status(), StatusCode::BAD_REQUEST);

    let empty = app
        .post(
            "/api/v1/orders",
            json!({ "customer_name": "Guest", "items": [] }),
        )
        .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let negative = app
        .post(
            "/api/v1/orders",
            json!({
                "customer_name": "Guest",
                "items": [{ "product_id": bread["id"], "quantity": "-1" }]
            }),
        )
        .await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn orders_list_filters_by_customer_and_status() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-6", "15").await;
    let regular = app.seed_customer("Regular", "0").await;

    app.create(
        "/api/v1/orders",
        json!({
            "customer_id": regular["id"],
            "items": [{ "product_id": bread["id"], "quantity": "1" }]
        }),
    )
    .await;
    app.create(
        "/api/v1/orders",
        json!({
            "customer_name": "Someone Else",
            "items": [{ "product_id": bread["id"], "quantity": "1" }]
        }),
    )
    .await;

    let all = response_json(app.get("/api/v1/orders").await).await;
    assert_eq!(all["data"]["total"], 2);

    let mine = response_json(
        app.get(&format!(
            "/api/v1/orders?customer_id={}",
            regular["id"].as_str().unwrap()
        ))
        .await,
    )
    .await;
    assert_eq!(mine["data"]["total"], 1);

    let via_customer = response_json(
        app.get(&format!(
            "/api/v1/customers/{}/orders",
            regular["id"].as_str().unwrap()
        ))
        .await,
    )
    .await;
    assert_eq!(via_customer["data"].as_array().unwrap().len(), 1);

    let confirmed = response_json(app.get("/api/v1/orders?status=confirmed").await).await;
    assert_eq!(confirmed["data"]["total"], 0);
}

#[tokio::test]
async fn oversized_quantities_and_prices_are_rejected() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-BIG", "40").await;
    let customer = app.seed_customer("Typo Traders", "0").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    for item in [
        json!({ "product_id": bread["id"], "quantity": "79228162514264337593543950335" }),
        json!({ "product_id": bread["id"], "quantity": "1", "unit_price": "1000000000000.01" }),
        json!({ "product_id": bread["id"], "quantity": "-1" }),
    ] {
        let response = app
            .post(
                "/api/v1/orders",
                json!({ "customer_id": customer_id, "items": [item] }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{item}");
    }

    let big_advance = app
        .post(
            "/api/v1/orders",
            json!({
                "customer_id": customer_id,
                "items": [{ "product_id": bread["id"], "quantity": "1" }],
                "initial_payment": "99999999999999999999"
            }),
        )
        .await;
    assert_eq!(big_advance.status(), StatusCode::BAD_REQUEST);

    // Nothing reached the books
    assert_eq!(customer_balance(&app, &customer_id).await, d!(0));
    let orders = response_json(app.get("/api/v1/orders").await).await;
    assert_eq!(orders["data"]["items"].as_array().unwrap().len(), 0);
}
