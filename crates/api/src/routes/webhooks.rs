//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use checkout::{PaymentGateway, RateProvider};
use ledger::InventoryLedger;
use serde::Serialize;
use store::{OrderStore, PaymentApplication};

use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
}

/// POST /webhooks/payment — apply a gateway payment event exactly once.
///
/// The raw body is handed to the gateway for verification; redeliveries
/// come back as `already_processed` with a 200 so the provider stops
/// retrying.
#[tracing::instrument(skip(state, body))]
pub async fn payment<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let application = state.payments.process_payment_event(&body).await?;
    Ok(Json(WebhookResponse {
        status: match application {
            PaymentApplication::Applied => "applied",
            PaymentApplication::AlreadyProcessed => "already_processed",
        },
    }))
}
