//! In-memory order store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BuyerId, OrderGroupId, OrderId, VendorId};
use domain::{Fulfillment, Order, PaymentRecord, RefundRecord, VendorShippingRate};
use tokio::sync::RwLock;

use crate::customer::Customer;
use crate::error::{Result, StoreError};
use crate::store::{OrderStore, PaymentApplication, ShipmentApplication, UpdateFn};

#[derive(Debug, Default)]
struct StoreState {
    orders: HashMap<OrderId, Order>,
    group_index: HashMap<OrderGroupId, Vec<OrderId>>,
    rates: HashMap<OrderId, VendorShippingRate>,
    fulfillments: HashMap<OrderId, Vec<Fulfillment>>,
    refunds: HashMap<OrderId, Vec<RefundRecord>>,
    payments: HashMap<String, PaymentRecord>,
    customers: Vec<Customer>,
    next_number: u64,
}

/// In-memory [`OrderStore`] used in tests and local development.
///
/// One `RwLock` around the whole state gives the same atomicity the relational
/// backend gets from a transaction: `insert_group` and every `update_order`
/// run under a single write lock, so concurrent guarded mutations serialize
/// and the losing one observes the winner's result.
#[derive(Debug, Clone)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                next_number: 1000,
                ..StoreState::default()
            })),
        }
    }

    /// Total number of stored orders, across all groups.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    #[tracing::instrument(skip(self, orders, rates))]
    async fn insert_group(
        &self,
        orders: Vec<Order>,
        rates: Vec<VendorShippingRate>,
    ) -> Result<()> {
        if orders.is_empty() {
            return Err(StoreError::EmptyGroup);
        }
        let mut state = self.state.write().await;

        // Validate the whole batch before touching state.
        for (i, order) in orders.iter().enumerate() {
            if state.orders.contains_key(&order.id())
                || orders[..i].iter().any(|o| o.id() == order.id())
            {
                return Err(StoreError::DuplicateOrder(order.id()));
            }
        }

        for order in orders {
            state
                .group_index
                .entry(order.group_id())
                .or_default()
                .push(order.id());
            state.orders.insert(order.id(), order);
        }
        for rate in rates {
            state.rates.insert(rate.order_id, rate);
        }
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.state
            .read()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(order_id))
    }

    async fn orders_in_group(&self, group_id: OrderGroupId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let ids = state
            .group_index
            .get(&group_id)
            .ok_or(StoreError::GroupNotFound(group_id))?;
        Ok(ids
            .iter()
            .filter_map(|id| state.orders.get(id).cloned())
            .collect())
    }

    #[tracing::instrument(skip(self, f))]
    async fn update_order(&self, order_id: OrderId, f: UpdateFn) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        let mut updated = order.clone();
        f(&mut updated)?;
        state.orders.insert(order_id, updated.clone());
        Ok(updated)
    }

    async fn next_order_number(&self) -> Result<String> {
        let mut state = self.state.write().await;
        let number = state.next_number;
        state.next_number += 1;
        Ok(format!("ORD-{number}"))
    }

    async fn resolve_customer(
        &self,
        vendor_id: VendorId,
        identity: Option<BuyerId>,
        email: &str,
        name: &str,
    ) -> Result<Customer> {
        let mut state = self.state.write().await;

        if let Some(buyer) = identity {
            if let Some(existing) = state
                .customers
                .iter()
                .find(|c| c.identity == Some(buyer) && c.vendor_id == vendor_id)
            {
                return Ok(existing.clone());
            }
            // Known buyer, first order with this vendor: carry the profile
            // over into the vendor's own customer list.
            if let Some(other_vendor) = state
                .customers
                .iter()
                .find(|c| c.identity == Some(buyer))
                .cloned()
            {
                let customer = Customer::new(
                    vendor_id,
                    Some(buyer),
                    other_vendor.email.clone(),
                    other_vendor.name.clone(),
                );
                state.customers.push(customer.clone());
                return Ok(customer);
            }
        }

        if identity.is_none() {
            if let Some(existing) = state
                .customers
                .iter()
                .find(|c| c.vendor_id == vendor_id && c.identity.is_none() && c.email == email)
            {
                return Ok(existing.clone());
            }
        }

        let customer = Customer::new(vendor_id, identity, email, name);
        state.customers.push(customer.clone());
        Ok(customer)
    }

    #[tracing::instrument(skip(self, fulfillment), fields(tracking = %fulfillment.tracking_number))]
    async fn record_shipment(&self, fulfillment: Fulfillment) -> Result<ShipmentApplication> {
        let mut state = self.state.write().await;
        let mut updated = state
            .orders
            .get(&fulfillment.order_id)
            .cloned()
            .ok_or(StoreError::OrderNotFound(fulfillment.order_id))?;

        if let Some(existing) = state
            .fulfillments
            .get(&fulfillment.order_id)
            .into_iter()
            .flatten()
            .find(|f| f.same_shipment(&fulfillment.carrier, &fulfillment.tracking_number))
        {
            if existing.covers_same_lines(&fulfillment.lines) {
                return Ok(ShipmentApplication::AlreadyRecorded);
            }
            return Err(StoreError::ShipmentCoverageMismatch {
                tracking_number: fulfillment.tracking_number.clone(),
            });
        }

        // Quantities and the row commit together; a rejection writes neither.
        let pairs: Vec<_> = fulfillment
            .lines
            .iter()
            .map(|line| (line.line_item_id, line.quantity))
            .collect();
        updated.record_line_shipment(&pairs)?;

        state.orders.insert(updated.id(), updated);
        state
            .fulfillments
            .entry(fulfillment.order_id)
            .or_default()
            .push(fulfillment);
        Ok(ShipmentApplication::Recorded)
    }

    async fn insert_fulfillment(&self, fulfillment: Fulfillment) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&fulfillment.order_id) {
            return Err(StoreError::OrderNotFound(fulfillment.order_id));
        }
        state
            .fulfillments
            .entry(fulfillment.order_id)
            .or_default()
            .push(fulfillment);
        Ok(())
    }

    async fn fulfillments_for_order(&self, order_id: OrderId) -> Result<Vec<Fulfillment>> {
        Ok(self
            .state
            .read()
            .await
            .fulfillments
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_refund(&self, refund: RefundRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&refund.order_id) {
            return Err(StoreError::OrderNotFound(refund.order_id));
        }
        state
            .refunds
            .entry(refund.order_id)
            .or_default()
            .push(refund);
        Ok(())
    }

    async fn refunds_for_order(&self, order_id: OrderId) -> Result<Vec<RefundRecord>> {
        Ok(self
            .state
            .read()
            .await
            .refunds
            .get(&order_id)
            .cloned()
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self, record), fields(key = %record.idempotency_key))]
    async fn apply_payment_event(&self, record: PaymentRecord) -> Result<PaymentApplication> {
        let mut state = self.state.write().await;
        if state.payments.contains_key(&record.idempotency_key) {
            return Ok(PaymentApplication::AlreadyProcessed);
        }

        let ids = state
            .group_index
            .get(&record.group_id)
            .cloned()
            .ok_or(StoreError::GroupNotFound(record.group_id))?;

        // Transition clones first: if any order rejects, the key stays
        // unconsumed and the provider's retry gets another chance.
        let mut transitioned = Vec::with_capacity(ids.len());
        for id in &ids {
            let mut order = state
                .orders
                .get(id)
                .cloned()
                .ok_or(StoreError::OrderNotFound(*id))?;
            order.mark_paid()?;
            transitioned.push(order);
        }

        for order in transitioned {
            state.orders.insert(order.id(), order);
        }
        state
            .payments
            .insert(record.idempotency_key.clone(), record);
        Ok(PaymentApplication::Applied)
    }

    async fn payment_for_group(&self, group_id: OrderGroupId) -> Result<Option<PaymentRecord>> {
        Ok(self
            .state
            .read()
            .await
            .payments
            .values()
            .find(|p| p.group_id == group_id)
            .cloned())
    }

    async fn find_group_by_tracking_token(&self, token: &str) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let group_id = state
            .orders
            .values()
            .find(|o| o.tracking_token() == Some(token))
            .map(|o| o.group_id());
        match group_id {
            Some(group_id) => {
                let ids = state
                    .group_index
                    .get(&group_id)
                    .ok_or(StoreError::GroupNotFound(group_id))?;
                Ok(ids
                    .iter()
                    .filter_map(|id| state.orders.get(id).cloned())
                    .collect())
            }
            None => Ok(Vec::new()),
        }
    }

    async fn rate_for_order(&self, order_id: OrderId) -> Result<Option<VendorShippingRate>> {
        Ok(self.state.read().await.rates.get(&order_id).cloned())
    }

    async fn update_rate(&self, rate: VendorShippingRate) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(&rate.order_id) {
            return Err(StoreError::OrderNotFound(rate.order_id));
        }
        state.rates.insert(rate.order_id, rate);
        Ok(())
    }
}
