//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, OrderGroupId};
use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};

/// A gateway payment intent created before checkout commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntent {
    /// Gateway reference stamped on every order of the group.
    pub reference: String,
    pub amount: Money,
    pub currency: String,
}

/// A verified payment confirmation extracted from a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Provider event identifier; the webhook deduplication anchor.
    pub idempotency_key: String,
    pub group_id: OrderGroupId,
    pub amount: Money,
    pub fee: Money,
    pub reference: String,
}

/// Gateway acknowledgement of a refund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundConfirmation {
    pub refund_reference: String,
    pub amount: Money,
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a payment intent for the whole order group.
    async fn create_intent(
        &self,
        group_id: OrderGroupId,
        amount: Money,
        currency: &str,
    ) -> Result<PaymentIntent>;

    /// Verifies a signed webhook payload into a payment event.
    async fn verify_event(&self, payload: &[u8]) -> Result<PaymentEvent>;

    /// Refunds part or all of a captured payment.
    async fn refund(&self, reference: &str, amount: Money) -> Result<RefundConfirmation>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    intents: HashMap<String, (OrderGroupId, Money)>,
    refunds: Vec<(String, Money)>,
    next_id: u32,
    fail_on_intent: bool,
    fail_on_refund: bool,
}

/// In-memory payment gateway for testing.
///
/// Webhook payloads are plain JSON [`PaymentEvent`]s; verification succeeds
/// when the payload parses and its reference matches a created intent.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail intent creation.
    pub fn set_fail_on_intent(&self, fail: bool) {
        self.state.write().unwrap().fail_on_intent = fail;
    }

    /// Configures the gateway to fail refund calls.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Returns the number of refunds issued.
    pub fn refund_count(&self) -> usize {
        self.state.read().unwrap().refunds.len()
    }

    /// Returns the total amount refunded against a reference.
    pub fn refunded_total(&self, reference: &str) -> Money {
        self.state
            .read()
            .unwrap()
            .refunds
            .iter()
            .filter(|(r, _)| r == reference)
            .map(|(_, amount)| *amount)
            .sum()
    }

    /// Builds a webhook payload confirming the intent with `reference`.
    pub fn confirmation_payload(
        &self,
        idempotency_key: &str,
        reference: &str,
        fee: Money,
    ) -> Vec<u8> {
        let state = self.state.read().unwrap();
        let (group_id, amount) = state.intents[reference];
        let event = PaymentEvent {
            idempotency_key: idempotency_key.to_string(),
            group_id,
            amount,
            fee,
            reference: reference.to_string(),
        };
        serde_json::to_vec(&event).unwrap()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_intent(
        &self,
        group_id: OrderGroupId,
        amount: Money,
        currency: &str,
    ) -> Result<PaymentIntent> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_intent {
            return Err(CheckoutError::ExternalService(
                "Payment intent declined".to_string(),
            ));
        }

        state.next_id += 1;
        let reference = format!("pi_{:04}", state.next_id);
        state.intents.insert(reference.clone(), (group_id, amount));

        Ok(PaymentIntent {
            reference,
            amount,
            currency: currency.to_string(),
        })
    }

    async fn verify_event(&self, payload: &[u8]) -> Result<PaymentEvent> {
        let event: PaymentEvent = serde_json::from_slice(payload)
            .map_err(|e| CheckoutError::Validation(format!("Unverifiable webhook payload: {e}")))?;

        let state = self.state.read().unwrap();
        if !state.intents.contains_key(&event.reference) {
            return Err(CheckoutError::Validation(format!(
                "Unknown payment reference: {}",
                event.reference
            )));
        }
        Ok(event)
    }

    async fn refund(&self, reference: &str, amount: Money) -> Result<RefundConfirmation> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(CheckoutError::ExternalService(
                "Refund declined".to_string(),
            ));
        }
        if !state.intents.contains_key(reference) {
            return Err(CheckoutError::Validation(format!(
                "Unknown payment reference: {reference}"
            )));
        }

        state.refunds.push((reference.to_string(), amount));
        let refund_reference = format!("re_{:04}", state.refunds.len());

        Ok(RefundConfirmation {
            refund_reference,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_intent_then_webhook_verification() {
        let gateway = InMemoryPaymentGateway::new();
        let group_id = OrderGroupId::new();

        let intent = gateway
            .create_intent(group_id, Money::from_cents(10500), "USD")
            .await
            .unwrap();
        assert!(intent.reference.starts_with("pi_"));

        let payload =
            gateway.confirmation_payload("evt_1", &intent.reference, Money::from_cents(335));
        let event = gateway.verify_event(&payload).await.unwrap();
        assert_eq!(event.group_id, group_id);
        assert_eq!(event.amount.cents(), 10500);
    }

    #[tokio::test]
    async fn test_unknown_reference_rejected() {
        let gateway = InMemoryPaymentGateway::new();
        let event = PaymentEvent {
            idempotency_key: "evt_1".to_string(),
            group_id: OrderGroupId::new(),
            amount: Money::from_cents(100),
            fee: Money::zero(),
            reference: "pi_9999".to_string(),
        };
        let payload = serde_json::to_vec(&event).unwrap();
        assert!(gateway.verify_event(&payload).await.is_err());
    }

    #[tokio::test]
    async fn test_refund_tracking() {
        let gateway = InMemoryPaymentGateway::new();
        let intent = gateway
            .create_intent(OrderGroupId::new(), Money::from_cents(2700), "USD")
            .await
            .unwrap();

        gateway
            .refund(&intent.reference, Money::from_cents(900))
            .await
            .unwrap();
        assert_eq!(gateway.refund_count(), 1);
        assert_eq!(gateway.refunded_total(&intent.reference).cents(), 900);
    }

    #[tokio::test]
    async fn test_fail_on_refund() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_refund(true);
        let result = gateway.refund("pi_0001", Money::from_cents(100)).await;
        assert!(matches!(result, Err(CheckoutError::ExternalService(_))));
        assert_eq!(gateway.refund_count(), 0);
    }
}
