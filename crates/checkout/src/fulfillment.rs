//! Vendor fulfillment: shipments, labels, cancellation.

use std::sync::Arc;

use common::{OrderGroupId, OrderId, VendorId};
use domain::{Fulfillment, FulfillmentLine, FulfillmentStatus, Order, aggregate_fulfillment};
use ledger::InventoryLedger;
use serde::Serialize;
use store::{OrderStore, ShipmentApplication};

use crate::error::{CheckoutError, Result};
use crate::services::rates::{Label, RateProvider, RateProviderError};
use crate::tracking::{NotificationDecision, TrackingDispatcher};

/// What a shipment call produced.
#[derive(Debug, Clone)]
pub struct ShipmentOutcome {
    pub order: Order,
    pub notification: NotificationDecision,
    /// False when an identical resubmission was recognized and skipped.
    pub newly_recorded: bool,
}

/// One vendor's row in the group fulfillment view.
#[derive(Debug, Clone, Serialize)]
pub struct VendorFulfillment {
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub fulfillment_status: FulfillmentStatus,
}

/// Per-vendor statuses plus the derived aggregate for one order group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupFulfillmentView {
    pub group_id: OrderGroupId,
    pub aggregate_status: FulfillmentStatus,
    pub vendors: Vec<VendorFulfillment>,
}

/// Drives per-vendor fulfillment against the order store and the ledger.
///
/// Shipping is where reservations become real stock movement: each covered
/// quantity is committed in the ledger as the order's line-level shipped
/// quantities advance.
pub struct FulfillmentService<L, S, R> {
    ledger: Arc<L>,
    store: Arc<S>,
    rates: Arc<R>,
    dispatcher: TrackingDispatcher<S>,
}

impl<L, S, R> FulfillmentService<L, S, R>
where
    L: InventoryLedger,
    S: OrderStore,
    R: RateProvider,
{
    pub fn new(
        ledger: Arc<L>,
        store: Arc<S>,
        rates: Arc<R>,
        dispatcher: TrackingDispatcher<S>,
    ) -> Self {
        Self {
            ledger,
            store,
            rates,
            dispatcher,
        }
    }

    /// Records a vendor shipment.
    ///
    /// Requires confirmed payment. Idempotent per (order, carrier, tracking
    /// number): resubmitting the same shipment with identical line coverage is
    /// a no-op success; the same tracking number with different quantities is
    /// rejected. Covered quantities are bounded by each line's unshipped
    /// remainder.
    ///
    /// The shipped quantities and the shipment row commit as one store step,
    /// so a resubmission that races the first attempt, or retries a failed
    /// ledger commit, can never advance the quantities twice.
    #[tracing::instrument(skip(self, covered))]
    pub async fn mark_vendor_shipped(
        &self,
        order_id: OrderId,
        carrier: &str,
        tracking_number: &str,
        covered: Vec<FulfillmentLine>,
    ) -> Result<ShipmentOutcome> {
        if covered.is_empty() {
            return Err(CheckoutError::Validation(
                "Shipment covers no line items".to_string(),
            ));
        }

        let application = self
            .store
            .record_shipment(Fulfillment::new(
                order_id,
                carrier,
                tracking_number,
                covered.clone(),
            ))
            .await?;
        if application == ShipmentApplication::AlreadyRecorded {
            return Ok(ShipmentOutcome {
                order: self.store.get_order(order_id).await?,
                notification: NotificationDecision::AlreadyNotified,
                newly_recorded: false,
            });
        }
        metrics::counter!("shipments_recorded_total").increment(1);

        // The hold becomes a stock decrement now that the units left the shelf.
        let order = self.store.get_order(order_id).await?;
        for line in &covered {
            if let Some(order_line) = order.line(line.line_item_id) {
                self.ledger
                    .commit(order_line.sku(), order_id, line.quantity)
                    .await?;
            }
        }

        let notification = self
            .dispatcher
            .handle_shipment(order_id, tracking_number)
            .await?;

        Ok(ShipmentOutcome {
            order: self.store.get_order(order_id).await?,
            notification,
            newly_recorded: true,
        })
    }

    /// Buys the shipping label for the rate selected at checkout.
    ///
    /// An expired rate token is re-quoted once for the same carrier and
    /// service; any price drift is logged and absorbed, never re-charged to
    /// the buyer.
    #[tracing::instrument(skip(self))]
    pub async fn purchase_label(&self, order_id: OrderId) -> Result<Label> {
        let mut rate = self
            .store
            .rate_for_order(order_id)
            .await?
            .ok_or_else(|| {
                CheckoutError::Validation("No shipping rate on file for this order".to_string())
            })?;

        let label = match self.rates.purchase_label(&rate.rate_id).await {
            Ok(label) => label,
            Err(RateProviderError::RateExpired(_)) => {
                let fresh = self.rates.requote(&rate.rate_id).await?;
                if fresh.price != rate.price {
                    tracing::warn!(
                        %order_id,
                        charged = %rate.price,
                        current = %fresh.price,
                        "rate price drifted between checkout and label purchase"
                    );
                }
                rate.rate_id = fresh.rate_id;
                self.rates.purchase_label(&rate.rate_id).await?
            }
            Err(err) => return Err(err.into()),
        };

        rate.confirm_label(&label.tracking_number, &label.label_url);
        self.store.update_rate(rate).await?;
        Ok(label)
    }

    /// Cancels one vendor's order and releases its inventory holds.
    ///
    /// Only possible before fulfillment begins; the rest of the group is
    /// untouched.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_vendor_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .store
            .update_order(order_id, Box::new(|o| o.cancel()))
            .await?;

        for line in order.lines() {
            self.ledger
                .release(line.sku(), order_id, line.quantity())
                .await?;
        }
        metrics::counter!("vendor_orders_canceled_total").increment(1);
        Ok(order)
    }

    /// Archives a completed or canceled order.
    pub async fn archive_order(&self, order_id: OrderId) -> Result<Order> {
        Ok(self
            .store
            .update_order(order_id, Box::new(|o| o.archive()))
            .await?)
    }

    /// Derives the group's aggregate fulfillment status from its orders.
    pub async fn group_fulfillment(&self, group_id: OrderGroupId) -> Result<GroupFulfillmentView> {
        let orders = self.store.orders_in_group(group_id).await?;
        let statuses: Vec<FulfillmentStatus> =
            orders.iter().map(|o| o.fulfillment_status()).collect();
        Ok(GroupFulfillmentView {
            group_id,
            aggregate_status: aggregate_fulfillment(&statuses),
            vendors: orders
                .iter()
                .map(|o| VendorFulfillment {
                    order_id: o.id(),
                    vendor_id: o.vendor_id(),
                    fulfillment_status: o.fulfillment_status(),
                })
                .collect(),
        })
    }
}
