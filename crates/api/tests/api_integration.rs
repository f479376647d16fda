//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, Sku, VendorId};
use ledger::InventoryLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_state() -> (axum::Router, Arc<api::InMemoryAppState>) {
    let state = api::create_default_state();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn address_json() -> serde_json::Value {
    serde_json::json!({
        "recipient": "Jo Reyes",
        "line1": "1 Main St",
        "line2": null,
        "city": "Springfield",
        "region": null,
        "postal_code": "12345",
        "country": "US"
    })
}

fn item_json(vendor_id: VendorId, sku: &str, quantity: u32, unit_cents: i64) -> serde_json::Value {
    serde_json::json!({
        "vendor_id": vendor_id,
        "vendor_owner": null,
        "sku": sku,
        "title": format!("Item {sku}"),
        "quantity": quantity,
        "unit_price": { "cents": unit_cents },
        "discount": { "cents": 0 },
        "dimensions": null,
        "ships_to": null
    })
}

fn cart_json(items: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "buyer": {
            "identity": null,
            "email": "jo@example.com",
            "name": "Jo Reyes"
        },
        "currency": "USD",
        "items": items,
        "discount_total": { "cents": 0 },
        "shipping_total": { "cents": 0 },
        "tax_total": { "cents": 0 },
        "shipping_address": address_json(),
        "billing_address": address_json()
    })
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

/// Seeds stock and runs a two-vendor checkout, returning the response body.
async fn committed_checkout(
    app: &axum::Router,
    state: &api::InMemoryAppState,
) -> serde_json::Value {
    let vendor_a = VendorId::new();
    let vendor_b = VendorId::new();
    state
        .ledger
        .set_on_hand(&Sku::from("A1"), 5)
        .await
        .unwrap();
    state
        .ledger
        .set_on_hand(&Sku::from("B1"), 5)
        .await
        .unwrap();

    let body = cart_json(vec![
        item_json(vendor_a, "A1", 1, 3000),
        item_json(vendor_b, "B1", 1, 5000),
    ]);
    let (status, json) = post_json(app, "/checkouts", body).await;
    assert_eq!(status, StatusCode::CREATED);
    json
}

/// Marks the whole group paid through the webhook endpoint.
async fn pay_group(app: &axum::Router, state: &api::InMemoryAppState, receipt: &serde_json::Value) {
    let reference = receipt["payment_reference"].as_str().unwrap();
    let payload = state
        .gateway
        .confirmation_payload("evt_pay_1", reference, Money::from_cents(50));
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payment")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup_with_state();
    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_checkout_splits_cart_into_vendor_orders() {
    let (app, state) = setup_with_state();
    let receipt = committed_checkout(&app, &state).await;

    let orders = receipt["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(receipt["total_cents"], 8000);
    assert!(receipt["payment_reference"].as_str().unwrap().len() > 0);
    for order in orders {
        assert_eq!(order["order_status"], "open");
        assert_eq!(order["payment_status"], "pending");
        assert!(order["number"].as_str().unwrap().starts_with("ORD-"));
    }

    // Individual lookup and group listing both resolve.
    let order_id = orders[0]["id"].as_str().unwrap();
    let (status, fetched) = get_json(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], orders[0]["id"]);

    let group_id = receipt["group_id"].as_str().unwrap();
    let (status, group) = get_json(&app, &format!("/order-groups/{group_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(group["orders"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let (app, state) = setup_with_state();
    let vendor = VendorId::new();
    state
        .ledger
        .set_on_hand(&Sku::from("A1"), 1)
        .await
        .unwrap();

    let (status, json) = post_json(&app, "/checkouts", cart_json(vec![item_json(vendor, "A1", 3, 1000)])).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));
}

#[tokio::test]
async fn test_self_purchase_is_forbidden() {
    let (app, state) = setup_with_state();
    let vendor = VendorId::new();
    state
        .ledger
        .set_on_hand(&Sku::from("A1"), 5)
        .await
        .unwrap();

    let buyer = uuid::Uuid::new_v4();
    let mut body = cart_json(vec![item_json(vendor, "A1", 1, 1000)]);
    body["buyer"]["identity"] = serde_json::json!(buyer);
    body["items"][0]["vendor_owner"] = serde_json::json!(buyer);

    let (status, json) = post_json(&app, "/checkouts", body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["error"].as_str().unwrap().contains("Item A1"));
}

#[tokio::test]
async fn test_webhook_deduplicates_redelivery() {
    let (app, state) = setup_with_state();
    let receipt = committed_checkout(&app, &state).await;

    let reference = receipt["payment_reference"].as_str().unwrap();
    let payload = state
        .gateway
        .confirmation_payload("evt_1", reference, Money::from_cents(88));

    for expected in ["applied", "already_processed"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/payment")
                    .body(Body::from(payload.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], expected);
    }

    let order_id = receipt["orders"][0]["id"].as_str().unwrap();
    let (_, order) = get_json(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["payment_status"], "paid");
}

#[tokio::test]
async fn test_shipment_before_payment_is_conflict() {
    let (app, state) = setup_with_state();
    let receipt = committed_checkout(&app, &state).await;

    let order = &receipt["orders"][0];
    let order_id = order["id"].as_str().unwrap();
    let ship = serde_json::json!({
        "carrier": "UPS",
        "tracking_number": "1Z111",
        "lines": [{ "line_item_id": order["lines"][0]["id"], "quantity": 1 }]
    });

    let (status, json) = post_json(&app, &format!("/orders/{order_id}/ship"), ship).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Payment"));
}

#[tokio::test]
async fn test_ship_then_track_through_public_token() {
    let (app, state) = setup_with_state();
    let receipt = committed_checkout(&app, &state).await;
    pay_group(&app, &state, &receipt).await;

    let order = &receipt["orders"][0];
    let order_id = order["id"].as_str().unwrap();
    let ship = serde_json::json!({
        "carrier": "UPS",
        "tracking_number": "1Z111",
        "lines": [{ "line_item_id": order["lines"][0]["id"], "quantity": 1 }]
    });

    let (status, shipped) = post_json(&app, &format!("/orders/{order_id}/ship"), ship).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["newly_recorded"], true);
    assert_eq!(shipped["notified"], true);
    assert_eq!(shipped["order"]["fulfillment_status"], "fulfilled");

    // The group token covers both vendors from one link.
    let token = shipped["order"]["tracking_token"].as_str().unwrap();
    let (status, view) = get_json(&app, &format!("/tracking/{token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["vendors"].as_array().unwrap().len(), 2);
    assert_eq!(view["aggregate_status"], "partial");

    let group_id = receipt["group_id"].as_str().unwrap();
    let (status, fulfillment) =
        get_json(&app, &format!("/order-groups/{group_id}/fulfillment")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fulfillment["aggregate_status"], "partial");

    let (status, _) = get_json(&app, "/tracking/trk_missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refund_endpoint_applies_and_guards_quantities() {
    let (app, state) = setup_with_state();
    let receipt = committed_checkout(&app, &state).await;
    pay_group(&app, &state, &receipt).await;

    let order = &receipt["orders"][0];
    let order_id = order["id"].as_str().unwrap();
    let refund = serde_json::json!({
        "lines": [{ "line_item_id": order["lines"][0]["id"], "quantity": 1 }],
        "restock": false,
        "reason": "changed mind"
    });

    let (status, refunded) = post_json(&app, &format!("/orders/{order_id}/refunds"), refund.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["amount_cents"], 3000);
    assert_eq!(refunded["kind"], "full");
    assert_eq!(refunded["order"]["payment_status"], "refunded");

    // The line is exhausted now.
    let (status, json) = post_json(&app, &format!("/orders/{order_id}/refunds"), refund).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("refundable"));
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let (app, _) = setup_with_state();
    let missing = uuid::Uuid::new_v4();
    let (status, _) = get_json(&app, &format!("/orders/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_order_id_is_bad_request() {
    let (app, _) = setup_with_state();
    let (status, json) = get_json(&app, "/orders/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid order id"));
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let (app, _) = setup_with_state();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
