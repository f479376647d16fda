//! Quantity-proportional refunds.

use std::sync::Arc;

use common::{LineItemId, Money, OrderId};
use domain::order::Order;
use domain::{DomainError, RefundKind, RefundLine, RefundRecord};
use ledger::InventoryLedger;
use store::OrderStore;

use crate::error::{CheckoutError, Result};
use crate::services::payment::PaymentGateway;

/// What a refund call produced.
#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub record: RefundRecord,
    pub order: Order,
}

/// Computes and applies line-quantity refunds.
///
/// Amounts are proportional to each line's discounted total, so a unit of a
/// discounted line refunds its actual paid share, not its list price. The
/// refunded quantities are claimed on the order before the gateway is
/// charged, so concurrent duplicates admit one winner; a gateway decline
/// backs the claim out.
pub struct RefundService<L, S, G> {
    ledger: Arc<L>,
    store: Arc<S>,
    gateway: Arc<G>,
}

impl<L, S, G> RefundService<L, S, G>
where
    L: InventoryLedger,
    S: OrderStore,
    G: PaymentGateway,
{
    pub fn new(ledger: Arc<L>, store: Arc<S>, gateway: Arc<G>) -> Self {
        Self {
            ledger,
            store,
            gateway,
        }
    }

    /// Refunds the requested quantities on one order.
    ///
    /// Per line, the requested quantity must fit within what has not been
    /// refunded yet. The refund is classified `Full` when it closes the
    /// order's remaining refundable total within a one-cent-per-line rounding
    /// epsilon. With `restock`, the refunded units return to available stock.
    #[tracing::instrument(skip(self, lines))]
    pub async fn process_refund(
        &self,
        order_id: OrderId,
        lines: Vec<RefundLine>,
        restock: bool,
        reason: Option<String>,
    ) -> Result<RefundOutcome> {
        if lines.is_empty() {
            return Err(CheckoutError::Validation(
                "Refund covers no line items".to_string(),
            ));
        }

        let order = self.store.get_order(order_id).await?;
        if !order.payment_status().is_confirmed() {
            return Err(CheckoutError::PaymentNotConfirmed);
        }
        let reference = order
            .payment_reference()
            .ok_or_else(|| {
                CheckoutError::Validation("Order has no payment reference".to_string())
            })?
            .to_string();

        // Sum duplicate line entries before validating, then price the refund.
        let mut totals: Vec<(LineItemId, u32)> = Vec::new();
        for line in &lines {
            if line.quantity == 0 {
                return Err(CheckoutError::Validation(
                    "Refund quantity must be positive".to_string(),
                ));
            }
            match totals.iter_mut().find(|(id, _)| *id == line.line_item_id) {
                Some((_, total)) => *total += line.quantity,
                None => totals.push((line.line_item_id, line.quantity)),
            }
        }
        let mut amount = Money::zero();
        for (line_id, quantity) in &totals {
            let line = order
                .line(*line_id)
                .ok_or(DomainError::LineItemNotFound(*line_id))?;
            if *quantity > line.refundable_quantity() {
                return Err(CheckoutError::RefundQuantityExceeded {
                    line_item_id: *line_id,
                    requested: *quantity,
                    refundable: line.refundable_quantity(),
                });
            }
            amount += line.refund_amount(*quantity);
        }

        let remaining = order.remaining_refundable_total();
        let epsilon = totals.len() as i64;
        let kind = if (remaining - amount).cents().abs() <= epsilon {
            RefundKind::Full
        } else {
            RefundKind::Partial
        };

        let refund_lines: Vec<RefundLine> = totals
            .iter()
            .map(|(line_item_id, quantity)| RefundLine {
                line_item_id: *line_item_id,
                quantity: *quantity,
            })
            .collect();

        // Claim the quantities under the store's guard before charging the
        // gateway: of two identical concurrent requests, the loser fails
        // here with `RefundQuantityExceeded` and never reaches the gateway.
        let applied = refund_lines.clone();
        let updated = self
            .store
            .update_order(order_id, Box::new(move |o| o.apply_refund(&applied, kind)))
            .await?;

        if let Err(decline) = self.gateway.refund(&reference, amount).await {
            let reverted = refund_lines.clone();
            self.store
                .update_order(order_id, Box::new(move |o| o.reverse_refund(&reverted)))
                .await?;
            return Err(decline);
        }

        if restock {
            for (line_id, quantity) in &totals {
                if let Some(line) = updated.line(*line_id) {
                    self.ledger
                        .restock(line.sku(), order_id, *quantity)
                        .await?;
                }
            }
        }

        let record = RefundRecord::new(order_id, amount, kind, reason, refund_lines, restock);
        self.store.insert_refund(record.clone()).await?;

        metrics::counter!("refunds_processed_total").increment(1);
        metrics::histogram!("refund_amount_cents").record(amount.cents() as f64);

        Ok(RefundOutcome {
            record,
            order: updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Address, OrderGroupId, Sku, VendorId};
    use domain::order::{NewOrder, OrderLineItem};
    use domain::PaymentStatus;
    use ledger::InMemoryLedger;
    use store::InMemoryOrderStore;

    use crate::services::payment::InMemoryPaymentGateway;

    struct Fixture {
        ledger: Arc<InMemoryLedger>,
        store: Arc<InMemoryOrderStore>,
        gateway: Arc<InMemoryPaymentGateway>,
        service: RefundService<InMemoryLedger, InMemoryOrderStore, InMemoryPaymentGateway>,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let store = Arc::new(InMemoryOrderStore::new());
        let gateway = Arc::new(InMemoryPaymentGateway::new());
        let service = RefundService::new(
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::clone(&gateway),
        );
        Fixture {
            ledger,
            store,
            gateway,
            service,
        }
    }

    /// A paid order with one line: quantity 3 at $10.00 less a $3.00 line
    /// discount, so the line total is $27.00.
    async fn paid_order(fx: &Fixture) -> (Order, String) {
        let group_id = OrderGroupId::new();
        let intent = fx
            .gateway
            .create_intent(group_id, Money::from_cents(2700), "USD")
            .await
            .unwrap();

        let mut order = Order::new(NewOrder {
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
            payment_reference: Some(intent.reference.clone()),
            lines: vec![
                OrderLineItem::new(
                    "SKU-001",
                    "Widget",
                    3,
                    Money::from_cents(1000),
                    Money::from_cents(300),
                )
                .unwrap(),
            ],
        })
        .unwrap();
        order.open().unwrap();
        order.mark_paid().unwrap();
        fx.store
            .insert_group(vec![order.clone()], vec![])
            .await
            .unwrap();
        (order, intent.reference)
    }

    fn one(order: &Order, quantity: u32) -> Vec<RefundLine> {
        vec![RefundLine {
            line_item_id: order.lines()[0].id(),
            quantity,
        }]
    }

    #[tokio::test]
    async fn test_one_unit_refunds_nine_dollars() {
        let fx = fixture();
        let (order, reference) = paid_order(&fx).await;

        let outcome = fx
            .service
            .process_refund(order.id(), one(&order, 1), false, None)
            .await
            .unwrap();
        assert_eq!(outcome.record.amount.cents(), 900);
        assert_eq!(outcome.record.kind, RefundKind::Partial);
        assert_eq!(
            outcome.order.payment_status(),
            PaymentStatus::PartiallyRefunded
        );
        assert_eq!(outcome.order.lines()[0].refundable_quantity(), 2);
        assert_eq!(fx.gateway.refunded_total(&reference).cents(), 900);
    }

    #[tokio::test]
    async fn test_closing_refund_classified_full() {
        let fx = fixture();
        let (order, _) = paid_order(&fx).await;

        fx.service
            .process_refund(order.id(), one(&order, 1), false, None)
            .await
            .unwrap();
        let outcome = fx
            .service
            .process_refund(order.id(), one(&order, 2), false, None)
            .await
            .unwrap();
        assert_eq!(outcome.record.amount.cents(), 1800);
        assert_eq!(outcome.record.kind, RefundKind::Full);
        assert_eq!(outcome.order.payment_status(), PaymentStatus::Refunded);

        // Exhausted: the same request again names the exceeded line.
        let result = fx
            .service
            .process_refund(order.id(), one(&order, 1), false, None)
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::RefundQuantityExceeded { refundable: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_excess_quantity_never_reaches_gateway() {
        let fx = fixture();
        let (order, _) = paid_order(&fx).await;

        let result = fx
            .service
            .process_refund(order.id(), one(&order, 4), false, None)
            .await;
        assert!(matches!(
            result,
            Err(CheckoutError::RefundQuantityExceeded {
                requested: 4,
                refundable: 3,
                ..
            })
        ));
        assert_eq!(fx.gateway.refund_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_decline_leaves_order_untouched() {
        let fx = fixture();
        let (order, _) = paid_order(&fx).await;
        fx.gateway.set_fail_on_refund(true);

        let result = fx
            .service
            .process_refund(order.id(), one(&order, 1), false, None)
            .await;
        assert!(matches!(result, Err(CheckoutError::ExternalService(_))));

        let stored = fx.store.get_order(order.id()).await.unwrap();
        assert_eq!(stored.payment_status(), PaymentStatus::Paid);
        assert_eq!(stored.lines()[0].refunded_quantity(), 0);
        assert!(fx
            .store
            .refunds_for_order(order.id())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_refunds_charge_gateway_once() {
        let fx = fixture();
        let (order, reference) = paid_order(&fx).await;
        let service = Arc::new(RefundService::new(
            Arc::clone(&fx.ledger),
            Arc::clone(&fx.store),
            Arc::clone(&fx.gateway),
        ));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = Arc::clone(&service);
            let lines = one(&order, 3);
            let order_id = order.id();
            handles.push(tokio::spawn(async move {
                service.process_refund(order_id, lines, false, None).await
            }));
        }

        let mut successes = 0;
        let mut exhausted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(outcome) => {
                    assert_eq!(outcome.record.amount.cents(), 2700);
                    successes += 1;
                }
                Err(CheckoutError::RefundQuantityExceeded { .. }) => exhausted += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(exhausted, 1);

        // The loser never reached the gateway.
        assert_eq!(fx.gateway.refund_count(), 1);
        assert_eq!(fx.gateway.refunded_total(&reference).cents(), 2700);
    }

    #[tokio::test]
    async fn test_restock_returns_units_to_stock() {
        let fx = fixture();
        let (order, _) = paid_order(&fx).await;
        let sku = Sku::from("SKU-001");
        fx.ledger.set_on_hand(&sku, 10).await.unwrap();

        fx.service
            .process_refund(
                order.id(),
                one(&order, 2),
                true,
                Some("damaged in transit".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(fx.ledger.on_hand(&sku).await.unwrap(), 12);

        let records = fx.store.refunds_for_order(order.id()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].restocked);
        assert_eq!(records[0].reason.as_deref(), Some("damaged in transit"));
    }

    #[tokio::test]
    async fn test_unpaid_order_cannot_refund() {
        let fx = fixture();
        let group_id = OrderGroupId::new();
        let mut order = Order::new(NewOrder {
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
        .unwrap();
        order.open().unwrap();
        let lines = one(&order, 1);
        let order_id = order.id();
        fx.store.insert_group(vec![order], vec![]).await.unwrap();

        let result = fx
            .service
            .process_refund(order_id, lines, false, None)
            .await;
        assert!(matches!(result, Err(CheckoutError::PaymentNotConfirmed)));
    }
}
