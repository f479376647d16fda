//! Payment webhook processing.

use std::sync::Arc;

use domain::PaymentRecord;
use store::{OrderStore, PaymentApplication};

use crate::error::Result;
use crate::services::payment::PaymentGateway;

/// Applies verified gateway payment events to order groups.
pub struct PaymentProcessor<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
}

impl<S, G> PaymentProcessor<S, G>
where
    S: OrderStore,
    G: PaymentGateway,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>) -> Self {
        Self { store, gateway }
    }

    /// Verifies a webhook payload and marks the group paid exactly once.
    ///
    /// The provider retries deliveries, so the event's idempotency key is the
    /// dedup anchor: a redelivered event short-circuits with
    /// `AlreadyProcessed` and causes no state transition. The store applies
    /// the key and the group transitions in one step, so a delivery that
    /// races the checkout commit fails without consuming the key and the
    /// provider's retry lands once the group exists.
    #[tracing::instrument(skip(self, payload))]
    pub async fn process_payment_event(&self, payload: &[u8]) -> Result<PaymentApplication> {
        let event = self.gateway.verify_event(payload).await?;

        let record = PaymentRecord::new(
            event.group_id,
            &event.idempotency_key,
            event.amount,
            event.fee,
            &event.reference,
        );
        match self.store.apply_payment_event(record).await? {
            PaymentApplication::AlreadyProcessed => {
                tracing::info!(key = %event.idempotency_key, "duplicate payment event ignored");
                metrics::counter!("payment_events_duplicate_total").increment(1);
                Ok(PaymentApplication::AlreadyProcessed)
            }
            PaymentApplication::Applied => {
                metrics::counter!("payment_events_applied_total").increment(1);
                Ok(PaymentApplication::Applied)
            }
        }
    }
}
