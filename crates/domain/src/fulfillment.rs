//! Vendor shipment events and the derived aggregate fulfillment status.

use chrono::{DateTime, Utc};
use common::{LineItemId, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::FulfillmentStatus;

/// Quantity of one line item covered by a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentLine {
    pub line_item_id: LineItemId,
    pub quantity: u32,
}

/// One vendor shipment event for an order.
///
/// An order accumulates multiple rows under partial shipment; the rows are
/// the audit trail, the order's line-level shipped quantities are the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
    pub id: Uuid,
    pub order_id: OrderId,
    pub carrier: String,
    pub tracking_number: String,
    pub shipped_at: DateTime<Utc>,
    pub lines: Vec<FulfillmentLine>,
}

impl Fulfillment {
    /// Creates a shipment event record stamped with the current time.
    pub fn new(
        order_id: OrderId,
        carrier: impl Into<String>,
        tracking_number: impl Into<String>,
        lines: Vec<FulfillmentLine>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            carrier: carrier.into(),
            tracking_number: tracking_number.into(),
            shipped_at: Utc::now(),
            lines,
        }
    }

    /// Returns true if `other` describes the same physical shipment.
    ///
    /// Resubmitting identical tracking data must be a no-op, not a second row.
    pub fn same_shipment(&self, carrier: &str, tracking_number: &str) -> bool {
        self.carrier == carrier && self.tracking_number == tracking_number
    }

    /// Returns true if `lines` covers exactly the same quantities, in any
    /// order.
    pub fn covers_same_lines(&self, lines: &[FulfillmentLine]) -> bool {
        self.lines.len() == lines.len()
            && self.lines.iter().all(|line| {
                lines.iter().any(|other| {
                    other.line_item_id == line.line_item_id && other.quantity == line.quantity
                })
            })
    }
}

/// Derives the master fulfillment status from the vendor statuses of one
/// order group.
///
/// This is a pure function recomputed on every read; the aggregate status is
/// never stored, so vendor and aggregate truth cannot drift.
///
/// - every vendor canceled → canceled
/// - otherwise canceled vendors drop out of the mix
/// - all remaining unfulfilled → unfulfilled
/// - all remaining fulfilled → fulfilled
/// - any mix with at least one shipment → partial
pub fn aggregate_fulfillment(statuses: &[FulfillmentStatus]) -> FulfillmentStatus {
    if statuses.is_empty() {
        return FulfillmentStatus::Unfulfilled;
    }
    if statuses
        .iter()
        .all(|s| *s == FulfillmentStatus::Canceled)
    {
        return FulfillmentStatus::Canceled;
    }

    let active: Vec<FulfillmentStatus> = statuses
        .iter()
        .copied()
        .filter(|s| *s != FulfillmentStatus::Canceled)
        .collect();

    if active.iter().all(|s| *s == FulfillmentStatus::Unfulfilled) {
        FulfillmentStatus::Unfulfilled
    } else if active.iter().all(|s| *s == FulfillmentStatus::Fulfilled) {
        FulfillmentStatus::Fulfilled
    } else {
        FulfillmentStatus::Partial
    }
}
