//! Group tracking tokens and shipment notifications.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{OrderGroupId, OrderId, VendorId};
use domain::{Fulfillment, FulfillmentStatus, aggregate_fulfillment};
use serde::Serialize;
use store::OrderStore;
use uuid::Uuid;

use crate::error::{CheckoutError, Result};

/// Whether a shipment event should produce a buyer notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationDecision {
    /// First sighting of this tracking number in the group.
    Notify,
    /// The group was already notified for this tracking number.
    AlreadyNotified,
}

/// Outbound notification channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Fired once after a checkout commits.
    async fn order_confirmed(&self, group_id: OrderGroupId) -> Result<()>;

    /// Fired once per distinct tracking number per group.
    async fn shipment_dispatched(
        &self,
        group_id: OrderGroupId,
        tracking_token: &str,
        tracking_number: &str,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemorySinkState {
    confirmations: Vec<OrderGroupId>,
    shipments: Vec<(OrderGroupId, String)>,
    fail: bool,
}

/// In-memory notification sink for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSink {
    state: Arc<RwLock<InMemorySinkState>>,
}

impl InMemoryNotificationSink {
    /// Creates a new in-memory sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sink to fail delivery.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap().fail = fail;
    }

    /// Returns the number of order confirmations delivered.
    pub fn confirmation_count(&self) -> usize {
        self.state.read().unwrap().confirmations.len()
    }

    /// Returns the number of shipment notifications delivered.
    pub fn shipment_count(&self) -> usize {
        self.state.read().unwrap().shipments.len()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn order_confirmed(&self, group_id: OrderGroupId) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(CheckoutError::ExternalService(
                "notification delivery failed".to_string(),
            ));
        }
        state.confirmations.push(group_id);
        Ok(())
    }

    async fn shipment_dispatched(
        &self,
        group_id: OrderGroupId,
        _tracking_token: &str,
        tracking_number: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap();
        if state.fail {
            return Err(CheckoutError::ExternalService(
                "notification delivery failed".to_string(),
            ));
        }
        state.shipments.push((group_id, tracking_number.to_string()));
        Ok(())
    }
}

/// One vendor's slice of the buyer-facing tracking page.
#[derive(Debug, Clone, Serialize)]
pub struct VendorTracking {
    pub vendor_id: VendorId,
    pub order_id: OrderId,
    pub order_number: String,
    pub fulfillment_status: FulfillmentStatus,
    pub fulfillments: Vec<Fulfillment>,
}

/// The buyer-facing tracking page for one order group.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub group_id: OrderGroupId,
    pub aggregate_status: FulfillmentStatus,
    pub vendors: Vec<VendorTracking>,
}

/// Issues group tracking tokens and decides shipment notifications.
///
/// One opaque token covers the whole order group; it is issued on the first
/// shipment and shared by every order, so the buyer follows all vendors from
/// one link. The buyer is notified once per distinct carrier tracking number.
pub struct TrackingDispatcher<S> {
    store: Arc<S>,
    sink: Arc<dyn NotificationSink>,
}

impl<S: OrderStore> TrackingDispatcher<S> {
    pub fn new(store: Arc<S>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }

    /// Routes a vendor shipment event: ensures the group token exists and
    /// notifies the buyer unless this tracking number was already announced.
    ///
    /// Expects the shipment's [`Fulfillment`] row to be recorded already; a
    /// second row with the same tracking number marks the group as notified.
    /// Sink failures are logged and never fail the shipment.
    #[tracing::instrument(skip(self))]
    pub async fn handle_shipment(
        &self,
        order_id: OrderId,
        tracking_number: &str,
    ) -> Result<NotificationDecision> {
        let order = self.store.get_order(order_id).await?;
        let group_id = order.group_id();
        let group = self.store.orders_in_group(group_id).await?;

        let token = group
            .iter()
            .find_map(|o| o.tracking_token().map(str::to_string))
            .unwrap_or_else(|| format!("trk_{}", Uuid::new_v4().simple()));

        for member in &group {
            if member.tracking_token().is_none() {
                let token = token.clone();
                self.store
                    .update_order(
                        member.id(),
                        Box::new(move |o| {
                            o.set_tracking_token(&token);
                            Ok(())
                        }),
                    )
                    .await?;
            }
        }

        let mut sightings = 0usize;
        for member in &group {
            for fulfillment in self.store.fulfillments_for_order(member.id()).await? {
                if fulfillment.tracking_number == tracking_number {
                    sightings += 1;
                }
            }
        }
        if sightings > 1 {
            return Ok(NotificationDecision::AlreadyNotified);
        }

        if let Err(err) = self
            .sink
            .shipment_dispatched(group_id, &token, tracking_number)
            .await
        {
            tracing::warn!(%group_id, tracking_number, error = %err, "shipment notification failed");
        }
        metrics::counter!("tracking_notifications_total").increment(1);
        Ok(NotificationDecision::Notify)
    }

    /// Resolves a public token into the per-vendor tracking page.
    pub async fn tracking_view(&self, token: &str) -> Result<TrackingView> {
        let orders = self.store.find_group_by_tracking_token(token).await?;
        if orders.is_empty() {
            return Err(CheckoutError::UnknownTrackingToken);
        }

        let group_id = orders[0].group_id();
        let statuses: Vec<FulfillmentStatus> =
            orders.iter().map(|o| o.fulfillment_status()).collect();

        let mut vendors = Vec::with_capacity(orders.len());
        for order in &orders {
            vendors.push(VendorTracking {
                vendor_id: order.vendor_id(),
                order_id: order.id(),
                order_number: order.number().to_string(),
                fulfillment_status: order.fulfillment_status(),
                fulfillments: self.store.fulfillments_for_order(order.id()).await?,
            });
        }

        Ok(TrackingView {
            group_id,
            aggregate_status: aggregate_fulfillment(&statuses),
            vendors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Address, Money};
    use domain::order::{NewOrder, Order, OrderLineItem};
    use store::InMemoryOrderStore;

    fn test_order(group_id: OrderGroupId) -> Order {
        Order::new(NewOrder {
            number: "ORD-1000".to_string(),
            group_id,
            vendor_id: VendorId::new(),
            customer_id: None,
            currency: "USD".to_string(),
            discount_total: Money::zero(),
            shipping_total: Money::zero(),
            tax_total: Money::zero(),
            shipping_address: Address::new("Jo", "1 Main St", "Springfield", "12345", "US"),
            billing_address: Address::new("Jo", "1 Main St", "Springfield", "12345", "US"),
            payment_reference: None,
            lines: vec![
                OrderLineItem::new("SKU-001", "Widget", 1, Money::from_cents(1000), Money::zero())
                    .unwrap(),
            ],
        })
        .unwrap()
    }

    async fn setup() -> (
        Arc<InMemoryOrderStore>,
        InMemoryNotificationSink,
        TrackingDispatcher<InMemoryOrderStore>,
        OrderGroupId,
        OrderId,
        OrderId,
    ) {
        let store = Arc::new(InMemoryOrderStore::new());
        let sink = InMemoryNotificationSink::new();
        let dispatcher = TrackingDispatcher::new(Arc::clone(&store), Arc::new(sink.clone()));

        let group_id = OrderGroupId::new();
        let a = test_order(group_id);
        let b = test_order(group_id);
        let (a_id, b_id) = (a.id(), b.id());
        store.insert_group(vec![a, b], vec![]).await.unwrap();
        (store, sink, dispatcher, group_id, a_id, b_id)
    }

    #[tokio::test]
    async fn test_token_issued_once_and_shared() {
        let (store, _sink, dispatcher, _group, a_id, b_id) = setup().await;

        store
            .insert_fulfillment(Fulfillment::new(a_id, "UPS", "1Z111", vec![]))
            .await
            .unwrap();
        dispatcher.handle_shipment(a_id, "1Z111").await.unwrap();

        let a = store.get_order(a_id).await.unwrap();
        let b = store.get_order(b_id).await.unwrap();
        let token = a.tracking_token().unwrap().to_string();
        assert_eq!(b.tracking_token(), Some(token.as_str()));

        // A later shipment from the other vendor keeps the same token.
        store
            .insert_fulfillment(Fulfillment::new(b_id, "FedEx", "F2222", vec![]))
            .await
            .unwrap();
        dispatcher.handle_shipment(b_id, "F2222").await.unwrap();
        let b = store.get_order(b_id).await.unwrap();
        assert_eq!(b.tracking_token(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn test_notify_once_per_tracking_number() {
        let (store, sink, dispatcher, _group, a_id, _b_id) = setup().await;

        store
            .insert_fulfillment(Fulfillment::new(a_id, "UPS", "1Z111", vec![]))
            .await
            .unwrap();
        assert_eq!(
            dispatcher.handle_shipment(a_id, "1Z111").await.unwrap(),
            NotificationDecision::Notify
        );

        store
            .insert_fulfillment(Fulfillment::new(a_id, "UPS", "1Z111", vec![]))
            .await
            .unwrap();
        assert_eq!(
            dispatcher.handle_shipment(a_id, "1Z111").await.unwrap(),
            NotificationDecision::AlreadyNotified
        );
        assert_eq!(sink.shipment_count(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_fail_shipment() {
        let (store, sink, dispatcher, _group, a_id, _b_id) = setup().await;
        sink.set_fail(true);

        store
            .insert_fulfillment(Fulfillment::new(a_id, "UPS", "1Z111", vec![]))
            .await
            .unwrap();
        let decision = dispatcher.handle_shipment(a_id, "1Z111").await.unwrap();
        assert_eq!(decision, NotificationDecision::Notify);
        assert_eq!(sink.shipment_count(), 0);
    }

    #[tokio::test]
    async fn test_tracking_view() {
        let (store, _sink, dispatcher, group_id, a_id, _b_id) = setup().await;

        store
            .insert_fulfillment(Fulfillment::new(a_id, "UPS", "1Z111", vec![]))
            .await
            .unwrap();
        dispatcher.handle_shipment(a_id, "1Z111").await.unwrap();

        let token = store
            .get_order(a_id)
            .await
            .unwrap()
            .tracking_token()
            .unwrap()
            .to_string();
        let view = dispatcher.tracking_view(&token).await.unwrap();
        assert_eq!(view.group_id, group_id);
        assert_eq!(view.vendors.len(), 2);
        assert_eq!(view.aggregate_status, FulfillmentStatus::Unfulfilled);

        let missing = dispatcher.tracking_view("trk_missing").await;
        assert!(matches!(missing, Err(CheckoutError::UnknownTrackingToken)));
    }
}
