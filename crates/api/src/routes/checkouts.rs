//! Checkout endpoint: one cart in, one committed order group out.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use checkout::{Cart, PaymentGateway, RateProvider, ServiceResolution};
use ledger::InventoryLedger;
use serde::{Deserialize, Serialize};
use store::OrderStore;

use crate::AppState;
use crate::error::ApiError;

use super::orders::OrderResponse;

#[derive(Deserialize)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub cart: Cart,
    /// Requested shipping service; omitted means cheapest common service.
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub group_id: String,
    /// The service every vendor ships with, absent when no common service
    /// existed and each vendor fell back to its own cheapest option.
    pub shipping_service: Option<String>,
    pub shipping_total_cents: i64,
    pub total_cents: i64,
    pub payment_reference: String,
    pub payment_amount_cents: i64,
    pub orders: Vec<OrderResponse>,
}

/// POST /checkouts — split a cart into per-vendor orders and commit the group.
#[tracing::instrument(skip(state, req))]
pub async fn create<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let receipt = state
        .orchestrator
        .create_checkout(req.cart, req.service.as_deref())
        .await?;

    let shipping_service = match receipt.resolution {
        ServiceResolution::Exact(service) => Some(service),
        ServiceResolution::CheapestFallback => None,
    };

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            group_id: receipt.group_id.to_string(),
            shipping_service,
            shipping_total_cents: receipt.shipping_total.cents(),
            total_cents: receipt.total.cents(),
            payment_reference: receipt.payment.reference,
            payment_amount_cents: receipt.payment.amount.cents(),
            orders: receipt.orders.iter().map(OrderResponse::from).collect(),
        }),
    ))
}
