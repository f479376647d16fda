//! Checkout orchestration: one cart in, one order group out.

use std::sync::Arc;

use common::{Address, BuyerId, CountryCode, Money, OrderGroupId, Sku, VendorId};
use domain::order::{NewOrder, Order, OrderLineItem};
use domain::shipping::VendorShippingRate;
use ledger::InventoryLedger;
use serde::Deserialize;
use store::OrderStore;

use crate::allocator::{self, ItemDimensions, ServiceResolution, VendorQuotes};
use crate::error::{CheckoutError, Result};
use crate::services::payment::{PaymentGateway, PaymentIntent};
use crate::services::rates::RateProvider;
use crate::tracking::NotificationSink;

/// Who is checking out.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyerInfo {
    /// Authenticated identity, absent for guests.
    pub identity: Option<BuyerId>,
    pub email: String,
    pub name: String,
}

/// One cart line as submitted at checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub vendor_id: VendorId,
    /// The identity behind the vendor, used for the self-purchase check.
    pub vendor_owner: Option<BuyerId>,
    pub sku: Sku,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    /// Item-level discount already applied to this line.
    #[serde(default)]
    pub discount: Money,
    /// Physical dimensions; items without them ship at no computed cost.
    pub dimensions: Option<ItemDimensions>,
    /// Countries this listing ships to; `None` means worldwide.
    pub ships_to: Option<Vec<CountryCode>>,
}

/// The full checkout submission.
#[derive(Debug, Clone, Deserialize)]
pub struct Cart {
    pub buyer: BuyerInfo,
    pub currency: String,
    pub items: Vec<CartItem>,
    /// Checkout-level discount, pro-rated across vendors by subtotal share.
    #[serde(default)]
    pub discount_total: Money,
    /// Flat checkout-level shipping charge, pro-rated like the discount.
    /// Carrier-quoted rates are added per vendor on top of this.
    #[serde(default)]
    pub shipping_total: Money,
    #[serde(default)]
    pub tax_total: Money,
    pub shipping_address: Address,
    pub billing_address: Address,
}

/// What the buyer gets back from a committed checkout.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub group_id: OrderGroupId,
    pub orders: Vec<Order>,
    pub resolution: ServiceResolution,
    pub shipping_total: Money,
    pub total: Money,
    pub payment: PaymentIntent,
}

/// Splits a cart into per-vendor orders and commits them as one group.
///
/// The commit is a unit of work: inventory reservations accumulate and are
/// released wholesale if any line cannot be reserved or the group insert
/// fails, so a failed checkout leaves no orders and no holds behind. No
/// external call happens between the first reservation and the group insert;
/// rates are quoted and the payment intent created beforehand.
pub struct CheckoutOrchestrator<L, S, G, R> {
    ledger: Arc<L>,
    store: Arc<S>,
    gateway: Arc<G>,
    rates: Arc<R>,
    sink: Arc<dyn NotificationSink>,
}

impl<L, S, G, R> CheckoutOrchestrator<L, S, G, R>
where
    L: InventoryLedger,
    S: OrderStore,
    G: PaymentGateway,
    R: RateProvider,
{
    pub fn new(
        ledger: Arc<L>,
        store: Arc<S>,
        gateway: Arc<G>,
        rates: Arc<R>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            ledger,
            store,
            gateway,
            rates,
            sink,
        }
    }

    /// Runs the whole checkout and returns the committed order group.
    #[tracing::instrument(skip(self, cart), fields(items = cart.items.len()))]
    pub async fn create_checkout(
        &self,
        cart: Cart,
        service: Option<&str>,
    ) -> Result<CheckoutReceipt> {
        if cart.items.is_empty() {
            return Err(CheckoutError::Validation("Cart is empty".to_string()));
        }

        self.check_self_purchase(&cart)?;
        self.check_shippability(&cart)?;

        let vendor_groups = group_by_vendor(&cart.items);

        // Quote each vendor's parcel, then resolve one rate per vendor.
        let mut quoted: Vec<VendorQuotes> = Vec::new();
        for (vendor_id, items) in &vendor_groups {
            let measured: Vec<(ItemDimensions, u32)> = items
                .iter()
                .filter_map(|item| item.dimensions.map(|d| (d, item.quantity)))
                .collect();
            if let Some(parcel) = allocator::parcel_envelope(&measured) {
                let quotes = self
                    .rates
                    .quote_rates(*vendor_id, &cart.shipping_address, &parcel)
                    .await?;
                if quotes.is_empty() {
                    return Err(CheckoutError::ShippingUnavailable {
                        country: cart.shipping_address.country.to_string(),
                        items: items.iter().map(|i| i.title.clone()).collect(),
                    });
                }
                quoted.push(VendorQuotes {
                    vendor_id: *vendor_id,
                    quotes,
                });
            }
        }
        let selection = allocator::select_rates(&quoted, service)?;

        // Pro-rate checkout-level amounts by vendor subtotal share.
        let weights: Vec<i64> = vendor_groups
            .iter()
            .map(|(_, items)| {
                items
                    .iter()
                    .map(|i| i.unit_price.multiply(i.quantity))
                    .sum::<Money>()
                    .cents()
            })
            .collect();
        let discount_shares = cart.discount_total.allocate(&weights);
        let shipping_shares = cart.shipping_total.allocate(&weights);
        let tax_shares = cart.tax_total.allocate(&weights);

        let group_id = OrderGroupId::new();
        let grand_total = self.grand_total(&cart, selection.total)?;
        let intent = self
            .gateway
            .create_intent(group_id, grand_total, &cart.currency)
            .await?;

        let mut orders: Vec<Order> = Vec::with_capacity(vendor_groups.len());
        let mut rates: Vec<VendorShippingRate> = Vec::new();
        for (idx, (vendor_id, items)) in vendor_groups.iter().enumerate() {
            let customer = self
                .store
                .resolve_customer(
                    *vendor_id,
                    cart.buyer.identity,
                    &cart.buyer.email,
                    &cart.buyer.name,
                )
                .await?;

            let mut lines = Vec::with_capacity(items.len());
            for item in items {
                lines.push(OrderLineItem::new(
                    item.sku.clone(),
                    item.title.clone(),
                    item.quantity,
                    item.unit_price,
                    item.discount,
                )?);
            }

            let vendor_rate = selection
                .rates
                .iter()
                .find(|(v, _)| v == vendor_id)
                .map(|(_, q)| q.clone());
            let shipping_total =
                shipping_shares[idx] + vendor_rate.as_ref().map_or(Money::zero(), |q| q.price);

            let mut order = Order::new(NewOrder {
                number: self.store.next_order_number().await?,
                group_id,
                vendor_id: *vendor_id,
                customer_id: Some(customer.id),
                currency: cart.currency.clone(),
                discount_total: discount_shares[idx],
                shipping_total,
                tax_total: tax_shares[idx],
                shipping_address: cart.shipping_address.clone(),
                billing_address: cart.billing_address.clone(),
                payment_reference: Some(intent.reference.clone()),
                lines,
            })?;
            order.open()?;

            if let Some(quote) = vendor_rate {
                rates.push(VendorShippingRate::new(
                    order.id(),
                    *vendor_id,
                    quote.carrier,
                    quote.service,
                    quote.price,
                    quote.currency,
                    quote.rate_id,
                ));
            }
            orders.push(order);
        }

        // Reserve every line; any failure releases the holds taken so far.
        let mut reserved: Vec<(Sku, common::OrderId, u32)> = Vec::new();
        for order in &orders {
            for line in order.lines() {
                if let Err(err) = self
                    .ledger
                    .reserve(line.sku(), order.id(), line.quantity())
                    .await
                {
                    self.release_all(&reserved).await;
                    return Err(err.into());
                }
                reserved.push((line.sku().clone(), order.id(), line.quantity()));
            }
        }

        if let Err(err) = self.store.insert_group(orders.clone(), rates).await {
            self.release_all(&reserved).await;
            return Err(err.into());
        }

        metrics::counter!("checkouts_committed_total").increment(1);
        metrics::histogram!("checkout_total_cents").record(grand_total.cents() as f64);

        // Post-commit, best effort only.
        if let Err(err) = self.sink.order_confirmed(group_id).await {
            tracing::warn!(%group_id, error = %err, "order confirmation notification failed");
        }

        Ok(CheckoutReceipt {
            group_id,
            orders,
            resolution: selection.resolution,
            shipping_total: selection.total + cart.shipping_total,
            total: grand_total,
            payment: intent,
        })
    }

    fn check_self_purchase(&self, cart: &Cart) -> Result<()> {
        let Some(buyer) = cart.buyer.identity else {
            return Ok(());
        };
        let offending: Vec<String> = cart
            .items
            .iter()
            .filter(|item| item.vendor_owner == Some(buyer))
            .map(|item| item.title.clone())
            .collect();
        if offending.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::NotAllowed { items: offending })
        }
    }

    fn check_shippability(&self, cart: &Cart) -> Result<()> {
        let country = &cart.shipping_address.country;
        let offending: Vec<String> = cart
            .items
            .iter()
            .filter(|item| {
                item.ships_to
                    .as_ref()
                    .is_some_and(|countries| !countries.contains(country))
            })
            .map(|item| item.title.clone())
            .collect();
        if offending.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::ShippingUnavailable {
                country: country.to_string(),
                items: offending,
            })
        }
    }

    fn grand_total(&self, cart: &Cart, rate_total: Money) -> Result<Money> {
        let subtotal: Money = cart
            .items
            .iter()
            .map(|i| i.unit_price.multiply(i.quantity))
            .sum();
        let item_discounts: Money = cart.items.iter().map(|i| i.discount).sum();
        let total = subtotal + rate_total + cart.shipping_total + cart.tax_total
            - cart.discount_total
            - item_discounts;
        if total.is_negative() {
            return Err(CheckoutError::Validation(
                "Discounts exceed the cart total".to_string(),
            ));
        }
        Ok(total)
    }

    async fn release_all(&self, reserved: &[(Sku, common::OrderId, u32)]) {
        for (sku, order_id, quantity) in reserved {
            if let Err(err) = self.ledger.release(sku, *order_id, *quantity).await {
                tracing::warn!(%sku, %order_id, quantity, error = %err, "failed to release reservation during rollback");
            }
        }
    }
}

/// Groups items by vendor, preserving first-appearance order.
fn group_by_vendor(items: &[CartItem]) -> Vec<(VendorId, Vec<&CartItem>)> {
    let mut groups: Vec<(VendorId, Vec<&CartItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(v, _)| *v == item.vendor_id) {
            Some((_, group)) => group.push(item),
            None => groups.push((item.vendor_id, vec![item])),
        }
    }
    groups
}
