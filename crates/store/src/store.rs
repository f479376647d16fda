//! Order store trait.

use async_trait::async_trait;
use common::{BuyerId, OrderGroupId, OrderId, VendorId};
use domain::{DomainError, Fulfillment, Order, PaymentRecord, RefundRecord, VendorShippingRate};

use crate::customer::Customer;
use crate::error::Result;

/// Guarded mutation applied to an order under the store's write lock.
///
/// The store clones the order, runs the closure, and only writes the result
/// back when the closure succeeds, so a rejected transition leaves the stored
/// order untouched.
pub type UpdateFn = Box<dyn FnOnce(&mut Order) -> std::result::Result<(), DomainError> + Send>;

/// Outcome of applying a payment gateway event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentApplication {
    /// First delivery of this event key; the group was marked paid and the
    /// record stored.
    Applied,
    /// An event with the same idempotency key was already recorded.
    AlreadyProcessed,
}

/// Outcome of recording a vendor shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentApplication {
    /// First sighting of this carrier and tracking number; the shipped
    /// quantities advanced and the row was stored.
    Recorded,
    /// An identical shipment was already on file; nothing changed.
    AlreadyRecorded,
}

/// Persistence boundary for orders, shipments, refunds and payments.
///
/// `insert_group` is the checkout commit: either every per-vendor order of a
/// checkout becomes visible together with its selected shipping rate, or none
/// of them do.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically inserts all orders of one checkout with their rates.
    async fn insert_group(
        &self,
        orders: Vec<Order>,
        rates: Vec<VendorShippingRate>,
    ) -> Result<()>;

    /// Fetches one order.
    async fn get_order(&self, order_id: OrderId) -> Result<Order>;

    /// Fetches every order in a group, in insertion order.
    async fn orders_in_group(&self, group_id: OrderGroupId) -> Result<Vec<Order>>;

    /// Applies a guarded mutation and returns the updated order.
    async fn update_order(&self, order_id: OrderId, f: UpdateFn) -> Result<Order>;

    /// Issues the next human-facing order number.
    async fn next_order_number(&self) -> Result<String>;

    /// Finds or creates the vendor-scoped customer for a checkout.
    ///
    /// Precedence: existing record for this identity and vendor, then any
    /// record for this identity (cloned into this vendor's scope), then a
    /// guest record matching the email for this vendor, then a new record.
    async fn resolve_customer(
        &self,
        vendor_id: VendorId,
        identity: Option<BuyerId>,
        email: &str,
        name: &str,
    ) -> Result<Customer>;

    /// Records a shipment and advances the order's shipped quantities in one
    /// atomic step, deduplicating on carrier and tracking number.
    ///
    /// An identical resubmission returns `AlreadyRecorded` without touching
    /// the order; the same tracking number with different line coverage is
    /// `ShipmentCoverageMismatch`. A rejected quantity writes nothing, not
    /// even the row.
    async fn record_shipment(&self, fulfillment: Fulfillment) -> Result<ShipmentApplication>;

    /// Appends a shipment event to the audit trail without touching the
    /// order. Backfill and test-fixture path; shipping goes through
    /// [`OrderStore::record_shipment`].
    async fn insert_fulfillment(&self, fulfillment: Fulfillment) -> Result<()>;

    /// Returns the shipment events recorded for an order, oldest first.
    async fn fulfillments_for_order(&self, order_id: OrderId) -> Result<Vec<Fulfillment>>;

    /// Appends a refund to the audit trail.
    async fn insert_refund(&self, refund: RefundRecord) -> Result<()>;

    /// Returns the refunds recorded for an order, oldest first.
    async fn refunds_for_order(&self, order_id: OrderId) -> Result<Vec<RefundRecord>>;

    /// Applies a payment event: deduplicates on the idempotency key and marks
    /// every order of the group paid, all under one guard.
    ///
    /// Nothing is recorded unless the whole group transitions: an unknown
    /// group is `GroupNotFound` and a rejected transition is a domain error,
    /// both leaving the key unconsumed so the provider's retry can land once
    /// the group exists.
    async fn apply_payment_event(&self, record: PaymentRecord) -> Result<PaymentApplication>;

    /// Returns the payment recorded for a group, if any.
    async fn payment_for_group(&self, group_id: OrderGroupId) -> Result<Option<PaymentRecord>>;

    /// Resolves a public tracking token to the orders of its group.
    async fn find_group_by_tracking_token(&self, token: &str) -> Result<Vec<Order>>;

    /// Returns the shipping rate selected for an order at checkout.
    async fn rate_for_order(&self, order_id: OrderId) -> Result<Option<VendorShippingRate>>;

    /// Replaces the stored rate for an order, keyed on `rate.order_id`.
    async fn update_rate(&self, rate: VendorShippingRate) -> Result<()>;
}
