//! Order group endpoints: member orders and the derived fulfillment view.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::{GroupFulfillmentView, PaymentGateway, RateProvider};
use common::OrderGroupId;
use ledger::InventoryLedger;
use serde::Serialize;
use store::OrderStore;

use crate::AppState;
use crate::error::ApiError;

use super::orders::OrderResponse;

#[derive(Serialize)]
pub struct GroupResponse {
    pub group_id: String,
    pub orders: Vec<OrderResponse>,
}

/// GET /order-groups/:id — list the per-vendor orders in one group.
#[tracing::instrument(skip(state))]
pub async fn get<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
) -> Result<Json<GroupResponse>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let group_id = parse_group_id(&id)?;
    let orders = state.store.orders_in_group(group_id).await?;
    Ok(Json(GroupResponse {
        group_id: group_id.to_string(),
        orders: orders.iter().map(OrderResponse::from).collect(),
    }))
}

/// GET /order-groups/:id/fulfillment — per-vendor statuses plus the aggregate.
#[tracing::instrument(skip(state))]
pub async fn fulfillment<L, S, G, R>(
    State(state): State<Arc<AppState<L, S, G, R>>>,
    Path(id): Path<String>,
) -> Result<Json<GroupFulfillmentView>, ApiError>
where
    L: InventoryLedger + 'static,
    S: OrderStore + 'static,
    G: PaymentGateway + 'static,
    R: RateProvider + 'static,
{
    let group_id = parse_group_id(&id)?;
    let view = state.fulfillment.group_fulfillment(group_id).await?;
    Ok(Json(view))
}

fn parse_group_id(id: &str) -> Result<OrderGroupId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order group id: {e}")))?;
    Ok(OrderGroupId::from_uuid(uuid))
}
