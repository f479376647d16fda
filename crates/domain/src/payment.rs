//! Payment confirmation records.

use chrono::{DateTime, Utc};
use common::{Money, OrderGroupId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A confirmed payment event from the gateway.
///
/// `idempotency_key` is the provider's own event identifier and is the
/// deduplication anchor for webhook redelivery: the store refuses to apply a
/// second record with the same key, so retried deliveries cannot double-pay
/// an order group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub group_id: OrderGroupId,
    pub idempotency_key: String,
    pub amount: Money,
    pub fee_amount: Money,
    /// Gateway reference used later for refunds.
    pub reference: String,
    pub received_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Creates a payment record stamped with the current time.
    pub fn new(
        group_id: OrderGroupId,
        idempotency_key: impl Into<String>,
        amount: Money,
        fee_amount: Money,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            idempotency_key: idempotency_key.into(),
            amount,
            fee_amount,
            reference: reference.into(),
            received_at: Utc::now(),
        }
    }
}
