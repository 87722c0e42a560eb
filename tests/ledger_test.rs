//! Running balances for customer and party ledgers.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{dec, response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec as d;
use serde_json::{json, Value};

fn entry(date: &str, description: &str, debit: &str, credit: &str) -> Value {
    json!({
        "txn_date": date,
        "description": description,
        "debit": debit,
        "credit": credit,
    })
}

fn balances(statement: &Value) -> Vec<Decimal> {
    statement["transactions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| dec(&row["balance"]))
        .collect()
}

async fn party_statement(app: &TestApp, party_id: &str, query: &str) -> Value {
    let response = app
        .get(&format!(
            "/api/v1/ledger/parties/{party_id}/statement{query}"
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    response_json(response).await["data"].clone()
}

#[tokio::test]
async fn backdated_entry_replays_later_balances() {
    let app = TestApp::new().await;
    let party = app.seed_party("Flour Mill", "1000").await;
    let party_id = party["id"].as_str().unwrap().to_string();
    let post_uri = format!("/api/v1/ledger/parties/{party_id}/transactions");

    app.create(&post_uri, entry("2024-03-01", "Flour purchase", "500", "0"))
        .await;
    app.create(&post_uri, entry("2024-03-10", "Payment made", "0", "300"))
        .await;

    let stmt = party_statement(&app, &party_id, "").await;
    assert_eq!(balances(&stmt), vec![d!(1500), d!(1200)]);

    // A row dated between the two shifts the later balance
    let backdated = app
        .create(&post_uri, entry("2024-03-05", "Sugar purchase", "200", "0"))
        .await;
    assert_eq!(dec(&backdated["balance"]), d!(1700));

    let stmt = party_statement(&app, &party_id, "").await;
    assert_eq!(balances(&stmt), vec![d!(1500), d!(1700), d!(1400)]);
    assert_eq!(dec(&stmt["closing_balance"]), d!(1400));
    assert_eq!(dec(&stmt["total_debit"]), d!(700));
    assert_eq!(dec(&stmt["total_credit"]), d!(300));

    let party = response_json(app.get(&format!("/api/v1/parties/{party_id}")).await).await;
    assert_eq!(dec(&party["data"]["current_balance"]), d!(1400));
}

#[tokio::test]
async fn editing_and_deleting_rows_recalculates() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Catering Co", "0").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();
    let post_uri = format!("/api/v1/ledger/customers/{customer_id}/transactions");

    let first = app
        .create(&post_uri, entry("2024-05-01", "Credit sale", "100", "0"))
        .await;
    let second = app
        .create(&post_uri, entry("2024-05-02", "Credit sale", "50", "0"))
        .await;
    assert_eq!(dec(&second["balance"]), d!(150));

    // Move the first row after the second and change its amount
    let edited = app
        .put(
            &format!("/api/v1/ledger/transactions/{}", first["id"].as_str().unwrap()),
            entry("2024-05-03", "Credit sale (corrected)", "120", "0"),
        )
        .await;
    assert_eq!(edited.status(), StatusCode::OK);
    let edited = response_json(edited).await;
    assert_eq!(dec(&edited["data"]["balance"]), d!(170));

    let second_now = response_json(
        app.get(&format!(
            "/api/v1/ledger/transactions/{}",
            second["id"].as_str().unwrap()
        ))
        .await,
    )
    .await;
    assert_eq!(dec(&second_now["data"]["balance"]), d!(50));

    let deleted = app
        .delete(&format!(
            "/api/v1/ledger/transactions/{}",
            second["id"].as_str().unwrap()
        ))
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let result = response_json(deleted).await;
    assert_eq!(dec(&result["data"]["balance"]), d!(120));

    let customer = response_json(app.get(&format!("/api/v1/customers/{customer_id}")).await).await;
    assert_eq!(dec(&customer["data"]["current_balance"]), d!(120));
}

#[tokio::test]
async fn order_posted_rows_are_locked() {
    let app = TestApp::new().await;
    let bread = app.seed_product("BRD-L", "20").await;
    let customer = app.seed_customer("Deli", "0").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    app.create(
        "/api/v1/orders",
        json!({
            "customer_id": customer_id,
            "items": [{ "product_id": bread["id"], "quantity": "5" }]
        }),
    )
    .await;

    let stmt = response_json(
        app.get(&format!("/api/v1/ledger/customers/{customer_id}/statement"))
            .await,
    )
    .await;
    let row_id = stmt["data"]["transactions"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let today = Utc::now().date_naive().to_string();

    let edit = app
        .put(
            &format!("/api/v1/ledger/transactions/{row_id}"),
            entry(&today, "Tampered", "1", "0"),
        )
        .await;
    assert_eq!(edit.status(), StatusCode::CONFLICT);

    let delete = app
        .delete(&format!("/api/v1/ledger/transactions/{row_id}"))
        .await;
    assert_eq!(delete.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn statement_window_carries_opening_balance() {
    let app = TestApp::new().await;
    let party = app.seed_party("Dairy Supplier", "250").await;
    let party_id = party["id"].as_str().unwrap().to_string();
    let post_uri = format!("/api/v1/ledger/parties/{party_id}/transactions");

    app.create(&post_uri, entry("2024-01-15", "Milk", "100", "0")).await;
    app.create(&post_uri, entry("2024-02-10", "Butter", "80", "0")).await;
    app.create(&post_uri, entry("2024-02-20", "Payment", "0", "150")).await;
    app.create(&post_uri, entry("2024-03-05", "Cream", "40", "0")).await;

    let feb = party_statement(&app, &party_id, "?from=2024-02-01&to=2024-02-29").await;
    assert_eq!(dec(&feb["opening_balance"]), d!(350));
    assert_eq!(feb["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(dec(&feb["total_debit"]), d!(80));
    assert_eq!(dec(&feb["total_credit"]), d!(150));
    assert_eq!(dec(&feb["closing_balance"]), d!(280));
    assert_eq!(feb["entity_name"], "Dairy Supplier");

    let inverted = app
        .get(&format!(
            "/api/v1/ledger/parties/{party_id}/statement?from=2024-03-01&to=2024-02-01"
        ))
        .await;
    assert_eq!(inverted.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn entry_must_be_one_sided() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Bistro", "0").await;
    let post_uri = format!(
        "/api/v1/ledger/customers/{}/transactions",
        customer["id"].as_str().unwrap()
    );

    let both = app
        .post(&post_uri, entry("2024-06-01", "Both sides", "10", "10"))
        .await;
    assert_eq!(both.status(), StatusCode::BAD_REQUEST);

    let neither = app
        .post(&post_uri, entry("2024-06-01", "Nothing", "0", "0"))
        .await;
    assert_eq!(neither.status(), StatusCode::BAD_REQUEST);

    let negative = app
        .post(&post_uri, entry("2024-06-01", "Negative", "-5", "0"))
        .await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let unknown = app
        .post(
            &format!(
                "/api/v1/ledger/customers/{}/transactions",
                uuid::Uuid::new_v4()
            ),
            entry("2024-06-01", "Ghost", "10", "0"),
        )
        .await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recalculate_rebuilds_from_opening_balance() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Guest House", "75").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();
    let post_uri = format!("/api/v1/ledger/customers/{customer_id}/transactions");
    let yesterday = (Utc::now() - Duration::days(1)).date_naive().to_string();

    app.create(&post_uri, entry(&yesterday, "Bread on credit", "25", "0"))
        .await;
    app.create(&post_uri, entry(&yesterday, "Cash received", "0", "100"))
        .await;

    let response = app
        .post(
            &format!("/api/v1/ledger/customers/{customer_id}/recalculate"),
            json!({}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let result = response_json(response).await;
    assert_eq!(result["data"]["rows"], 2);
    assert_eq!(dec(&result["data"]["balance"]), d!(0));
}

#[tokio::test]
async fn cashier_can_post_but_not_edit() {
    let app = TestApp::new().await;
    let (_, cashier) = app.user_with_role("till", "cashier").await;
    let customer = app.seed_customer("Regular", "0").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();

    let posted = app
        .request(
            axum::http::Method::POST,
            &format!("/api/v1/ledger/customers/{customer_id}/transactions"),
            Some(entry("2024-07-01", "Cash sale on account", "30", "0")),
            Some(&cashier),
        )
        .await;
    assert_eq!(posted.status(), StatusCode::CREATED);
    let row = response_json(posted).await;

    let edit = app
        .request(
            axum::http::Method::PUT,
            &format!(
                "/api/v1/ledger/transactions/{}",
                row["data"]["id"].as_str().unwrap()
            ),
            Some(entry("2024-07-01", "Changed", "20", "0")),
            Some(&cashier),
        )
        .await;
    assert_eq!(edit.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn changing_opening_balance_replays_the_ledger() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("School Canteen", "0").await;
    let customer_id = customer["id"].as_str().unwrap().to_string();
    app.create(
        &format!("/api/v1/ledger/customers/{customer_id}/transactions"),
        entry("2024-08-01", "Monthly supply", "100", "0"),
    )
    .await;

    let updated = app
        .put(
            &format!("/api/v1/customers/{customer_id}"),
            json!({ "opening_balance": "50" }),
        )
        .await;
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = response_json(updated).await;
    assert_eq!(dec(&updated["data"]["current_balance"]), d!(150));

    let stmt = response_json(
        app.get(&format!("/api/v1/ledger/customers/{customer_id}/statement"))
            .await,
    )
    .await;
    assert_eq!(balances(&stmt["data"]), vec![d!(150)]);

    // Accounts with history stay
    let refused = app.delete(&format!("/api/v1/customers/{customer_id}")).await;
    assert_eq!(refused.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn amounts_beyond_the_cap_are_rejected() {
    let app = TestApp::new().await;
    let party = app.seed_party("Oven Dealer", "0").await;
    let party_id = party["id"].as_str().unwrap().to_string();
    let post_uri = format!("/api/v1/ledger/parties/{party_id}/transactions");

    let huge = app
        .post(
            &post_uri,
            entry("2024-07-01", "Typo", "50000000000000000000000000000", "0"),
        )
        .await;
    assert_eq!(huge.status(), StatusCode::BAD_REQUEST);
    let huge_credit = app
        .post(&post_uri, entry("2024-07-01", "Typo", "0", "1000000000000.01"))
        .await;
    assert_eq!(huge_credit.status(), StatusCode::BAD_REQUEST);

    let stmt = party_statement(&app, &party_id, "").await;
    assert!(stmt["transactions"].as_array().unwrap().is_empty());

    let largest = app
        .post(&post_uri, entry("2024-07-01", "New oven", "1000000000000", "0"))
        .await;
    assert_eq!(largest.status(), StatusCode::CREATED);
    let stmt = party_statement(&app, &party_id, "").await;
    assert_eq!(dec(&stmt["closing_balance"]), d!(1000000000000));

    let opening = app
        .post(
            "/api/v1/customers",
            json!({ "name": "Whale", "opening_balance": "-79228162514264337593543950335" }),
        )
        .await;
    assert_eq!(opening.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_postings_keep_a_consistent_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("ledger.db").display()
    );
    let app = TestApp::with_config(|c| {
        c.database_url = url;
        c.db_max_connections = 4;
    })
    .await;
    let party = app.seed_party("Busy Supplier", "100").await;
    let party_id = party["id"].as_str().unwrap().to_string();
    let post_uri = format!("/api/v1/ledger/parties/{party_id}/transactions");

    // Dates interleave so most postings land before earlier-posted rows
    let bodies: Vec<Value> = (0..20)
        .map(|i| {
            let day = 1 + (i * 7) % 28;
            if i % 3 == 0 {
                entry(&format!("2024-04-{day:02}"), &format!("Payment {i}"), "0", "15")
            } else {
                entry(&format!("2024-04-{day:02}"), &format!("Delivery {i}"), "40", "0")
            }
        })
        .collect();
    let responses =
        futures::future::join_all(bodies.iter().map(|body| app.post(&post_uri, body.clone())))
            .await;
    for response in &responses {
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let stmt = party_statement(&app, &party_id, "").await;
    let rows = stmt["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 20);

    let mut running = d!(100);
    let mut last_date = String::new();
    for row in rows {
        let date = row["txn_date"].as_str().unwrap().to_string();
        assert!(date >= last_date, "rows out of order: {date} after {last_date}");
        last_date = date;
        running += dec(&row["debit"]) - dec(&row["credit"]);
        assert_eq!(dec(&row["balance"]), running);
    }
    // 7 payments of 15 and 13 deliveries of 40
    assert_eq!(running, d!(100) + d!(520) - d!(105));
    assert_eq!(dec(&stmt["closing_balance"]), running);

    let party = response_json(app.get(&format!("/api/v1/parties/{party_id}")).await).await;
    assert_eq!(dec(&party["data"]["current_balance"]), running);
    assert_eq!(app.state.services.ledger.held_locks(), 0);
}
