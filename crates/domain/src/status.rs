//! Order, payment, and fulfillment status enums.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a per-vendor order.
///
/// ```text
/// Draft ──► Open ──┬──► Completed ──► Archived
///                  └──► Canceled  ──► Archived
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order is being assembled inside the checkout transaction.
    #[default]
    Draft,

    /// Order is placed and awaiting fulfillment.
    Open,

    /// Vendor fulfillment is complete and payment confirmed (terminal).
    Completed,

    /// Order was canceled before fulfillment began (terminal).
    Canceled,

    /// Hidden from default views; a visibility flag, never reversed.
    Archived,
}

impl OrderStatus {
    /// Returns true if the order can be opened from this state.
    pub fn can_open(&self) -> bool {
        matches!(self, OrderStatus::Draft)
    }

    /// Returns true if the order can be completed from this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Open)
    }

    /// Returns true if the order can be canceled from this state.
    ///
    /// Cancellation is additionally gated on fulfillment not having begun;
    /// that check lives on [`crate::Order`] where the fulfillment state is.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Open)
    }

    /// Returns true if the order can be archived from this state.
    pub fn can_archive(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Canceled | OrderStatus::Archived
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Open => "open",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment state of a per-vendor order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting gateway confirmation.
    #[default]
    Pending,

    /// Gateway confirmed the payment in full.
    Paid,

    /// Part of the paid amount has been refunded.
    PartiallyRefunded,

    /// The full paid amount has been refunded.
    Refunded,
}

impl PaymentStatus {
    /// Returns true once the payment gateway has confirmed funds.
    ///
    /// Fulfillment actions are hard-gated on this, not on UI state.
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Returns true if a (further) refund can be issued in this state.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::PartiallyRefunded)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vendor-level fulfillment state.
///
/// `Unfulfilled → Partial → Fulfilled`, with `Canceled` reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    /// No shipment recorded yet.
    #[default]
    Unfulfilled,

    /// Some, but not all, quantities have shipped.
    Partial,

    /// Every quantity has shipped (terminal).
    Fulfilled,

    /// The vendor order was canceled (terminal).
    Canceled,
}

impl FulfillmentStatus {
    /// Returns true once at least one shipment has been recorded.
    pub fn has_shipped(&self) -> bool {
        matches!(self, FulfillmentStatus::Partial | FulfillmentStatus::Fulfilled)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FulfillmentStatus::Fulfilled | FulfillmentStatus::Canceled)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Unfulfilled => "unfulfilled",
            FulfillmentStatus::Partial => "partial",
            FulfillmentStatus::Fulfilled => "fulfilled",
            FulfillmentStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
