//! Per-vendor order endpoints: lookup, shipment, label, cancel, refunds.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::{NotificationDecision, PaymentGateway, RateProvider};
use common::OrderId;
use domain::order::Order;
use domain::{FulfillmentLine, RefundLine};
use ledger::InventoryLedger;
use serde::{Deserialize, Serialize};
use store::OrderStore;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ShipRequest {
    pub carrier: String,
    pub tracking_number: String,
    pub lines: Vec<FulfillmentLine>,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    pub lines: Vec<RefundLine>,
    #[serde(default)]
    pub restock: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderLineResponse {
    pub id: String,
    pub sku: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    pub line_total_cents: i64,
    pub shipped_quantity: u32,
    pub refunded_quantity: u32,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub number: String,
    pub group_id: String,
    pub vendor_id: String,
    pub currency: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub shipping_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub order_status: String,
    pub payment_status: String,
    pub fulfillment_status: String,
    pub tracking_token: Option<String>,
    pub lines: Vec<OrderLineResponse>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let lines = order
            .lines()
            .iter()
            .map(|line| OrderLineResponse {
                id: line.id().to_string(),
                sku: line.sku().to_string(),
                title: line.title().to_string(),
                quantity: line.quantity(),
                unit_price_cents: line.unit_price().cents(),
                discount_cents: line.discount().cents(),
                line_total_cents: line.line_total().cents(),
                shipped_quantity: line.shipped_quantity(),
                refunded_quantity: line.refunded_quantity(),
            })
            .collect();

        Self {
            id: order.id().to_string(),
            number: order.number().to_string(),
            group_id: order.group_id().to_string(),
            vendor_id: order.vendor_id().to_string(),
            currency: order.currency().to_string(),
            subtotal_cents: order.subtotal().cents(),
            discount_cents: order.discount_total().cents(),
            shipping_cents: order.shipping_total().cents(),
            tax_cents: order.tax_total().cents(),
            total_cents: order.total().cents(),
            order_status: order.order_status().to_string(),
            payment_status: order.payment_status().to_string(),
            fulfillment_status: order.fulfillment_status().to_string(),
            tracking_token: order.tracking_token().map(String::from),
            lines,
        }
    }
}

#[derive(Serialize)]
pub struct ShipResponse {
    pub order: OrderResponse,
    pub notified: bool,
    pub newly_recorded: bool,
}

#[derive(Serialize)]
pub struct LabelResponse {
    pub tracking_number: String,
    pub label_url: String,
}

#[derive(Serialize)]
pub struct RefundResponse {
    pub refund_id: String,
    pub amount_cents: i64,
    pub kind: domain::RefundKind,
    pub restocked: bool,
    pub order: OrderResponse,
}

// -- Handlers --

/// GET /orders/:id — load a single vendor order.
#[tracing::instrument(skip(state))]
pub async fn get<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.store.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/ship — record a vendor shipment.
#[tracing::instrument(skip(state, req))]
pub async fn ship<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
    Json(req): Json<ShipRequest>,
) -> Result<Json<ShipResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let order_id = parse_order_id(&id)?;
    let outcome = state
        .fulfillment
        .mark_vendor_shipped(order_id, &req.carrier, &req.tracking_number, req.lines)
        .await?;

    Ok(Json(ShipResponse {
        order: OrderResponse::from(&outcome.order),
        notified: outcome.notification == NotificationDecision::Notify,
        newly_recorded: outcome.newly_recorded,
    }))
}

/// POST /orders/:id/label — purchase the shipping label for the stored rate.
#[tracing::instrument(skip(state))]
pub async fn label<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
) -> Result<Json<LabelResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let order_id = parse_order_id(&id)?;
    let label = state.fulfillment.purchase_label(order_id).await?;
    Ok(Json(LabelResponse {
        tracking_number: label.tracking_number,
        label_url: label.label_url,
    }))
}

/// POST /orders/:id/cancel — cancel one vendor order and release its holds.
#[tracing::instrument(skip(state))]
pub async fn cancel<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.fulfillment.cancel_vendor_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/archive — archive a completed or canceled order.
#[tracing::instrument(skip(state))]
pub async fn archive<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.fulfillment.archive_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/refunds — refund line quantities on one order.
#[tracing::instrument(skip(state, req))]
pub async fn refund<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let order_id = parse_order_id(&id)?;
    let outcome = state
        .refunds
        .process_refund(order_id, req.lines, req.restock, req.reason)
        .await?;

    Ok(Json(RefundResponse {
        refund_id: outcome.record.id.to_string(),
        amount_cents: outcome.record.amount.cents(),
        kind: outcome.record.kind,
        restocked: outcome.record.restocked,
        order: OrderResponse::from(&outcome.order),
    }))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
