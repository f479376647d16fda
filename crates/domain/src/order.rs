//! Per-vendor order rows and their transition guards.

use chrono::{DateTime, Utc};
use common::{Address, CustomerId, LineItemId, Money, OrderGroupId, OrderId, Sku, VendorId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};
use crate::refund::{RefundKind, RefundLine};
use crate::status::{FulfillmentStatus, OrderStatus, PaymentStatus};

/// A single line of a per-vendor order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    id: LineItemId,
    sku: Sku,
    title: String,
    quantity: u32,
    unit_price: Money,
    discount: Money,
    refunded_quantity: u32,
    shipped_quantity: u32,
}

impl OrderLineItem {
    /// Creates a line item, validating quantity and discount bounds.
    pub fn new(
        sku: impl Into<Sku>,
        title: impl Into<String>,
        quantity: u32,
        unit_price: Money,
        discount: Money,
    ) -> Result<Self> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        let subtotal = unit_price.multiply(quantity);
        if discount > subtotal {
            return Err(DomainError::DiscountExceedsSubtotal {
                discount: discount.cents(),
                subtotal: subtotal.cents(),
            });
        }
        Ok(Self {
            id: LineItemId::new(),
            sku: sku.into(),
            title: title.into(),
            quantity,
            unit_price,
            discount,
            refunded_quantity: 0,
            shipped_quantity: 0,
        })
    }

    /// Returns the line item identifier.
    pub fn id(&self) -> LineItemId {
        self.id
    }

    /// Returns the stock-keeping unit.
    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    /// Returns the display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the ordered quantity.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns the unit price.
    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// Returns the per-line discount amount.
    pub fn discount(&self) -> Money {
        self.discount
    }

    /// Returns `unit_price * quantity`.
    pub fn line_subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    /// Returns `unit_price * quantity - discount`.
    pub fn line_total(&self) -> Money {
        self.line_subtotal() - self.discount
    }

    /// Returns the quantity refunded so far. Monotone, never exceeds `quantity`.
    pub fn refunded_quantity(&self) -> u32 {
        self.refunded_quantity
    }

    /// Returns `quantity - refunded_quantity`, the ceiling on further refunds.
    pub fn refundable_quantity(&self) -> u32 {
        self.quantity - self.refunded_quantity
    }

    /// Returns the quantity shipped so far.
    pub fn shipped_quantity(&self) -> u32 {
        self.shipped_quantity
    }

    /// Returns the quantity not yet covered by any shipment.
    pub fn unshipped_quantity(&self) -> u32 {
        self.quantity - self.shipped_quantity
    }

    /// Returns the refund amount for `quantity` units of this line.
    ///
    /// Proportional to the line total rather than recomputed from list price,
    /// so baked-in discounts are refunded pro rata.
    pub fn refund_amount(&self, quantity: u32) -> Money {
        self.line_total().proportional(quantity, self.quantity)
    }

    /// Returns the refund amount still claimable against this line.
    pub fn remaining_refundable_amount(&self) -> Money {
        self.refund_amount(self.refundable_quantity())
    }
}

/// Fields required to build a new per-vendor order.
///
/// `subtotal` and `total` are computed, never supplied.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: String,
    pub group_id: OrderGroupId,
    pub vendor_id: VendorId,
    pub customer_id: Option<CustomerId>,
    pub currency: String,
    pub discount_total: Money,
    pub shipping_total: Money,
    pub tax_total: Money,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_reference: Option<String>,
    pub lines: Vec<OrderLineItem>,
}

/// One per-vendor order created from a customer checkout.
///
/// Money invariant, enforced at construction: `total = subtotal + shipping +
/// tax - discount`, never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    number: String,
    group_id: OrderGroupId,
    vendor_id: VendorId,
    customer_id: Option<CustomerId>,
    currency: String,
    subtotal: Money,
    discount_total: Money,
    shipping_total: Money,
    tax_total: Money,
    total: Money,
    order_status: OrderStatus,
    payment_status: PaymentStatus,
    fulfillment_status: FulfillmentStatus,
    shipping_address: Address,
    billing_address: Address,
    tracking_token: Option<String>,
    payment_reference: Option<String>,
    lines: Vec<OrderLineItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a draft order, computing subtotal and total from the lines.
    pub fn new(params: NewOrder) -> Result<Self> {
        let subtotal: Money = params.lines.iter().map(|l| l.line_subtotal()).sum();
        let line_discounts: Money = params.lines.iter().map(|l| l.discount()).sum();
        let discount_total = params.discount_total + line_discounts;
        let total = subtotal + params.shipping_total + params.tax_total - discount_total;
        if total.is_negative() {
            return Err(DomainError::NegativeTotal {
                total_cents: total.cents(),
            });
        }

        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            number: params.number,
            group_id: params.group_id,
            vendor_id: params.vendor_id,
            customer_id: params.customer_id,
            currency: params.currency,
            subtotal,
            discount_total,
            shipping_total: params.shipping_total,
            tax_total: params.tax_total,
            total,
            order_status: OrderStatus::Draft,
            payment_status: PaymentStatus::Pending,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            shipping_address: params.shipping_address,
            billing_address: params.billing_address,
            tracking_token: None,
            payment_reference: params.payment_reference,
            lines: params.lines,
            created_at: now,
            updated_at: now,
        })
    }

    // -- Queries --

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn group_id(&self) -> OrderGroupId {
        self.group_id
    }

    pub fn vendor_id(&self) -> VendorId {
        self.vendor_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_total(&self) -> Money {
        self.discount_total
    }

    pub fn shipping_total(&self) -> Money {
        self.shipping_total
    }

    pub fn tax_total(&self) -> Money {
        self.tax_total
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn order_status(&self) -> OrderStatus {
        self.order_status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn fulfillment_status(&self) -> FulfillmentStatus {
        self.fulfillment_status
    }

    pub fn shipping_address(&self) -> &Address {
        &self.shipping_address
    }

    pub fn billing_address(&self) -> &Address {
        &self.billing_address
    }

    /// Returns the opaque group tracking token, if any shipment issued one.
    pub fn tracking_token(&self) -> Option<&str> {
        self.tracking_token.as_deref()
    }

    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference.as_deref()
    }

    pub fn lines(&self) -> &[OrderLineItem] {
        &self.lines
    }

    pub fn line(&self, id: LineItemId) -> Option<&OrderLineItem> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the refund amount still claimable across all lines.
    pub fn remaining_refundable_total(&self) -> Money {
        self.lines
            .iter()
            .map(|l| l.remaining_refundable_amount())
            .sum()
    }

    // -- Transitions --

    /// Opens a draft order. Happens inside the checkout commit.
    pub fn open(&mut self) -> Result<()> {
        if !self.order_status.can_open() {
            return Err(self.invalid_transition("open"));
        }
        self.order_status = OrderStatus::Open;
        self.touch();
        Ok(())
    }

    /// Marks the order paid following gateway confirmation.
    pub fn mark_paid(&mut self) -> Result<()> {
        if self.payment_status != PaymentStatus::Pending {
            return Err(self.invalid_transition("mark paid"));
        }
        self.payment_status = PaymentStatus::Paid;
        self.maybe_complete();
        self.touch();
        Ok(())
    }

    /// Records shipped quantities against this order's lines.
    ///
    /// Hard precondition: payment confirmed. Advances the vendor fulfillment
    /// status and completes the order once everything has shipped.
    pub fn record_line_shipment(&mut self, covered: &[(LineItemId, u32)]) -> Result<()> {
        if !self.payment_status.is_confirmed() {
            return Err(DomainError::PaymentNotConfirmed);
        }
        if self.fulfillment_status == FulfillmentStatus::Canceled
            || !matches!(self.order_status, OrderStatus::Open)
        {
            return Err(self.invalid_transition("record shipment"));
        }

        // Validate the summed coverage per line before mutating anything, so a
        // request repeating the same line cannot slip past a per-entry check.
        let mut totals: Vec<(LineItemId, u32)> = Vec::new();
        for (line_id, qty) in covered {
            if *qty == 0 {
                return Err(DomainError::InvalidQuantity { quantity: *qty });
            }
            match totals.iter_mut().find(|(id, _)| id == line_id) {
                Some((_, total)) => *total += qty,
                None => totals.push((*line_id, *qty)),
            }
        }
        for (line_id, qty) in &totals {
            let line = self
                .line(*line_id)
                .ok_or(DomainError::LineItemNotFound(*line_id))?;
            if *qty > line.unshipped_quantity() {
                return Err(DomainError::ShipmentQuantityExceeded {
                    line_item_id: *line_id,
                    requested: *qty,
                    remaining: line.unshipped_quantity(),
                });
            }
        }

        for (line_id, qty) in &totals {
            if let Some(line) = self.lines.iter_mut().find(|l| l.id == *line_id) {
                line.shipped_quantity += qty;
            }
        }

        self.fulfillment_status = self.derive_fulfillment_status();
        self.maybe_complete();
        self.touch();
        Ok(())
    }

    /// Applies a validated refund: bumps line quantities, flips payment status.
    pub fn apply_refund(&mut self, lines: &[RefundLine], kind: RefundKind) -> Result<()> {
        if !self.payment_status.can_refund() {
            return Err(self.invalid_transition("refund"));
        }

        let mut totals: Vec<(LineItemId, u32)> = Vec::new();
        for refund_line in lines {
            if refund_line.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    quantity: refund_line.quantity,
                });
            }
            match totals
                .iter_mut()
                .find(|(id, _)| *id == refund_line.line_item_id)
            {
                Some((_, total)) => *total += refund_line.quantity,
                None => totals.push((refund_line.line_item_id, refund_line.quantity)),
            }
        }
        for (line_id, qty) in &totals {
            let line = self
                .line(*line_id)
                .ok_or(DomainError::LineItemNotFound(*line_id))?;
            if *qty > line.refundable_quantity() {
                return Err(DomainError::RefundQuantityExceeded {
                    line_item_id: *line_id,
                    requested: *qty,
                    refundable: line.refundable_quantity(),
                });
            }
        }

        for (line_id, qty) in &totals {
            if let Some(line) = self.lines.iter_mut().find(|l| l.id == *line_id) {
                line.refunded_quantity += qty;
            }
        }

        self.payment_status = match kind {
            RefundKind::Full => PaymentStatus::Refunded,
            RefundKind::Partial => PaymentStatus::PartiallyRefunded,
        };
        self.touch();
        Ok(())
    }

    /// Backs a refund application out after a gateway decline.
    ///
    /// Inverse of [`Order::apply_refund`]: decrements the refunded quantities
    /// and recomputes the payment status from what stays refunded.
    pub fn reverse_refund(&mut self, lines: &[RefundLine]) -> Result<()> {
        if !matches!(
            self.payment_status,
            PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
        ) {
            return Err(self.invalid_transition("reverse refund"));
        }

        let mut totals: Vec<(LineItemId, u32)> = Vec::new();
        for refund_line in lines {
            match totals
                .iter_mut()
                .find(|(id, _)| *id == refund_line.line_item_id)
            {
                Some((_, total)) => *total += refund_line.quantity,
                None => totals.push((refund_line.line_item_id, refund_line.quantity)),
            }
        }
        for (line_id, qty) in &totals {
            let line = self
                .line(*line_id)
                .ok_or(DomainError::LineItemNotFound(*line_id))?;
            if *qty > line.refunded_quantity() {
                return Err(self.invalid_transition("reverse refund"));
            }
        }

        for (line_id, qty) in &totals {
            if let Some(line) = self.lines.iter_mut().find(|l| l.id == *line_id) {
                line.refunded_quantity -= qty;
            }
        }

        self.payment_status = if self.lines.iter().any(|l| l.refunded_quantity > 0) {
            PaymentStatus::PartiallyRefunded
        } else {
            PaymentStatus::Paid
        };
        self.touch();
        Ok(())
    }

    /// Cancels the order. Only possible before fulfillment begins.
    pub fn cancel(&mut self) -> Result<()> {
        if !self.order_status.can_cancel() || self.fulfillment_status.has_shipped() {
            return Err(self.invalid_transition("cancel"));
        }
        self.order_status = OrderStatus::Canceled;
        self.fulfillment_status = FulfillmentStatus::Canceled;
        self.touch();
        Ok(())
    }

    /// Archives a completed or canceled order. Never reversed.
    pub fn archive(&mut self) -> Result<()> {
        if !self.order_status.can_archive() {
            return Err(self.invalid_transition("archive"));
        }
        self.order_status = OrderStatus::Archived;
        self.touch();
        Ok(())
    }

    /// Attaches the group tracking token. First writer wins; resetting to the
    /// same token is a no-op. Returns true if the token was newly set.
    pub fn set_tracking_token(&mut self, token: &str) -> bool {
        if self.tracking_token.is_some() {
            return false;
        }
        self.tracking_token = Some(token.to_string());
        self.touch();
        true
    }

    fn derive_fulfillment_status(&self) -> FulfillmentStatus {
        if self.lines.iter().all(|l| l.unshipped_quantity() == 0) {
            FulfillmentStatus::Fulfilled
        } else if self.lines.iter().any(|l| l.shipped_quantity > 0) {
            FulfillmentStatus::Partial
        } else {
            FulfillmentStatus::Unfulfilled
        }
    }

    fn maybe_complete(&mut self) {
        if self.order_status.can_complete()
            && self.fulfillment_status == FulfillmentStatus::Fulfilled
            && self.payment_status.is_confirmed()
        {
            self.order_status = OrderStatus::Completed;
        }
    }

    fn invalid_transition(&self, action: &'static str) -> DomainError {
        DomainError::InvalidStateTransition {
            current: format!(
                "{}/{}/{}",
                self.order_status, self.payment_status, self.fulfillment_status
            ),
            action,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address() -> Address {
        Address::new("Jo Reyes", "1 Main St", "Springfield", "12345", "US")
    }

    fn test_order(lines: Vec<OrderLineItem>) -> Order {
        Order::new(NewOrder {
            number: "ORD-1000".to_string(),
            group_id: OrderGroupId::new(),
            vendor_id: VendorId::new(),
            customer_id: Some(CustomerId::new()),
            currency: "USD".to_string(),
            discount_total: Money::zero(),
            shipping_total: Money::zero(),
            tax_total: Money::zero(),
            shipping_address: test_address(),
            billing_address: test_address(),
            payment_reference: None,
            lines,
        })
        .unwrap()
    }

    fn line(qty: u32, unit_cents: i64, discount_cents: i64) -> OrderLineItem {
        OrderLineItem::new(
            "SKU-001",
            "Widget",
            qty,
            Money::from_cents(unit_cents),
            Money::from_cents(discount_cents),
        )
        .unwrap()
    }

    #[test]
    fn test_total_invariant() {
        let order = Order::new(NewOrder {
            number: "ORD-1000".to_string(),
            group_id: OrderGroupId::new(),
            vendor_id: VendorId::new(),
            customer_id: None,
            currency: "USD".to_string(),
            discount_total: Money::from_cents(500),
            shipping_total: Money::from_cents(750),
            tax_total: Money::from_cents(400),
            shipping_address: test_address(),
            billing_address: test_address(),
            payment_reference: None,
            lines: vec![line(2, 1000, 0)],
        })
        .unwrap();

        // 2000 + 750 + 400 - 500
        assert_eq!(order.subtotal().cents(), 2000);
        assert_eq!(order.total().cents(), 2650);
    }

    #[test]
    fn test_negative_total_rejected() {
        let result = Order::new(NewOrder {
            number: "ORD-1000".to_string(),
            group_id: OrderGroupId::new(),
            vendor_id: VendorId::new(),
            customer_id: None,
            currency: "USD".to_string(),
            discount_total: Money::from_cents(5000),
            shipping_total: Money::zero(),
            tax_total: Money::zero(),
            shipping_address: test_address(),
            billing_address: test_address(),
            payment_reference: None,
            lines: vec![line(1, 1000, 0)],
        });
        assert!(matches!(result, Err(DomainError::NegativeTotal { .. })));
    }

    #[test]
    fn test_line_total_subtracts_discount() {
        let l = line(3, 1000, 300);
        assert_eq!(l.line_subtotal().cents(), 3000);
        assert_eq!(l.line_total().cents(), 2700);
    }

    #[test]
    fn test_refund_amount_is_proportional() {
        // Quantity 3, line total $27 after discount: one unit refunds $9.00
        let l = line(3, 1000, 300);
        assert_eq!(l.refund_amount(1).cents(), 900);
        assert_eq!(l.refund_amount(3).cents(), 2700);
    }

    #[test]
    fn test_zero_quantity_line_rejected() {
        let result = OrderLineItem::new("SKU-001", "Widget", 0, Money::from_cents(100), Money::zero());
        assert!(matches!(result, Err(DomainError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_shipment_requires_payment() {
        let mut order = test_order(vec![line(2, 1000, 0)]);
        order.open().unwrap();
        let line_id = order.lines()[0].id();

        let result = order.record_line_shipment(&[(line_id, 2)]);
        assert!(matches!(result, Err(DomainError::PaymentNotConfirmed)));
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Unfulfilled);
    }

    #[test]
    fn test_partial_then_full_shipment() {
        let mut order = test_order(vec![line(3, 1000, 0)]);
        order.open().unwrap();
        order.mark_paid().unwrap();
        let line_id = order.lines()[0].id();

        order.record_line_shipment(&[(line_id, 1)]).unwrap();
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Partial);
        assert_eq!(order.order_status(), OrderStatus::Open);

        order.record_line_shipment(&[(line_id, 2)]).unwrap();
        assert_eq!(order.fulfillment_status(), FulfillmentStatus::Fulfilled);
        assert_eq!(order.order_status(), OrderStatus::Completed);
    }

    #[test]
    fn test_overshipment_rejected() {
        let mut order = test_order(vec![line(2, 1000, 0)]);
        order.open().unwrap();
        order.mark_paid().unwrap();
        let line_id = order.lines()[0].id();

        let result = order.record_line_shipment(&[(line_id, 3)]);
        assert!(matches!(
            result,
            Err(DomainError::ShipmentQuantityExceeded { .. })
        ));
        assert_eq!(order.lines()[0].shipped_quantity(), 0);
    }

    #[test]
    fn test_refund_bounds() {
        let mut order = test_order(vec![line(3, 1000, 300)]);
        order.open().unwrap();
        order.mark_paid().unwrap();
        let line_id = order.lines()[0].id();

        order
            .apply_refund(
                &[RefundLine {
                    line_item_id: line_id,
                    quantity: 1,
                }],
                RefundKind::Partial,
            )
            .unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(order.lines()[0].refunded_quantity(), 1);
        assert_eq!(order.lines()[0].refundable_quantity(), 2);

        let result = order.apply_refund(
            &[RefundLine {
                line_item_id: line_id,
                quantity: 3,
            }],
            RefundKind::Full,
        );
        assert!(matches!(
            result,
            Err(DomainError::RefundQuantityExceeded { .. })
        ));
        // Failed validation must not partially apply.
        assert_eq!(order.lines()[0].refunded_quantity(), 1);
    }

    #[test]
    fn test_reverse_refund_restores_quantities_and_status() {
        let mut order = test_order(vec![line(3, 1000, 300)]);
        order.open().unwrap();
        order.mark_paid().unwrap();
        let line_id = order.lines()[0].id();
        let one = [RefundLine {
            line_item_id: line_id,
            quantity: 1,
        }];

        order.apply_refund(&one, RefundKind::Partial).unwrap();
        order.apply_refund(&one, RefundKind::Partial).unwrap();
        assert_eq!(order.lines()[0].refunded_quantity(), 2);

        order.reverse_refund(&one).unwrap();
        assert_eq!(order.lines()[0].refunded_quantity(), 1);
        assert_eq!(order.payment_status(), PaymentStatus::PartiallyRefunded);

        order.reverse_refund(&one).unwrap();
        assert_eq!(order.lines()[0].refunded_quantity(), 0);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);

        // Nothing left to back out.
        assert!(order.reverse_refund(&one).is_err());
    }

    #[test]
    fn test_cancel_only_before_fulfillment() {
        let mut order = test_order(vec![line(2, 1000, 0)]);
        order.open().unwrap();
        order.mark_paid().unwrap();
        let line_id = order.lines()[0].id();

        order.record_line_shipment(&[(line_id, 1)]).unwrap();
        assert!(order.cancel().is_err());

        let mut fresh = test_order(vec![line(2, 1000, 0)]);
        fresh.open().unwrap();
        fresh.cancel().unwrap();
        assert_eq!(fresh.order_status(), OrderStatus::Canceled);
        assert_eq!(fresh.fulfillment_status(), FulfillmentStatus::Canceled);
    }

    #[test]
    fn test_archive_is_terminal() {
        let mut order = test_order(vec![line(1, 1000, 0)]);
        order.open().unwrap();
        order.cancel().unwrap();
        order.archive().unwrap();
        assert_eq!(order.order_status(), OrderStatus::Archived);
        assert!(order.archive().is_err());
    }

    #[test]
    fn test_tracking_token_set_once() {
        let mut order = test_order(vec![line(1, 1000, 0)]);
        assert!(order.set_tracking_token("TRK-1"));
        assert!(!order.set_tracking_token("TRK-2"));
        assert_eq!(order.tracking_token(), Some("TRK-1"));
    }

    #[test]
    fn test_remaining_refundable_total() {
        let mut order = test_order(vec![line(3, 1000, 300)]);
        order.open().unwrap();
        order.mark_paid().unwrap();
        let line_id = order.lines()[0].id();
        assert_eq!(order.remaining_refundable_total().cents(), 2700);

        order
            .apply_refund(
                &[RefundLine {
                    line_item_id: line_id,
                    quantity: 1,
                }],
                RefundKind::Partial,
            )
            .unwrap();
        assert_eq!(order.remaining_refundable_total().cents(), 1800);
    }
}
