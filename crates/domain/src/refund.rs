//! Refund audit records.

use chrono::{DateTime, Utc};
use common::{LineItemId, Money, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether a refund closed out the order's refundable total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundKind {
    /// Closes the remaining refundable total (within rounding epsilon).
    Full,
    /// Leaves refundable quantity behind.
    Partial,
}

/// One (line item, quantity) pair of a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundLine {
    pub line_item_id: LineItemId,
    pub quantity: u32,
}

/// Audit record tying a refund amount to the exact lines it covered.
///
/// The trail is what makes `refunded_quantity` auditable and lets a repeated
/// identical refund request be recognized as already applied instead of paid
/// twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    pub id: Uuid,
    pub order_id: OrderId,
    pub amount: Money,
    pub kind: RefundKind,
    pub reason: Option<String>,
    pub lines: Vec<RefundLine>,
    pub restocked: bool,
    pub created_at: DateTime<Utc>,
}

impl RefundRecord {
    /// Creates a refund record stamped with the current time.
    pub fn new(
        order_id: OrderId,
        amount: Money,
        kind: RefundKind,
        reason: Option<String>,
        lines: Vec<RefundLine>,
        restocked: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            amount,
            kind,
            reason,
            lines,
            restocked,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_record_captures_lines() {
        let line_id = LineItemId::new();
        let record = RefundRecord::new(
            OrderId::new(),
            Money::from_cents(900),
            RefundKind::Partial,
            Some("damaged in transit".to_string()),
            vec![RefundLine {
                line_item_id: line_id,
                quantity: 1,
            }],
            true,
        );
        assert_eq!(record.lines.len(), 1);
        assert_eq!(record.lines[0].line_item_id, line_id);
        assert_eq!(record.amount.cents(), 900);
    }
}
