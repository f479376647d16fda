//! Buyer-facing tracking page, resolved from the public group token.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::{PaymentGateway, RateProvider, TrackingView};
use ledger::InventoryLedger;
use store::OrderStore;

use crate::AppState;
use crate::error::ApiError;

/// GET /tracking/:token — the per-vendor tracking view for one order group.
#[tracing::instrument(skip(state))]
pub async fn get<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(token): Path<String>,
) -> Result<Json<TrackingView>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let view = state.tracking.tracking_view(&token).await?;
    Ok(Json(view))
}
