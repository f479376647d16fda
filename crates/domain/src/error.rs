//! Domain error types.

use common::LineItemId;
use thiserror::Error;

/// Errors raised by domain-level invariants and transition guards.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested action is not valid in the current state.
    #[error("Cannot {action} while order is {current}")]
    InvalidStateTransition {
        current: String,
        action: &'static str,
    },

    /// A fulfillment action was attempted before payment confirmation.
    ///
    /// This is a hard precondition on vendor shipment, not a UI nicety.
    #[error("Payment has not been confirmed for this order")]
    PaymentNotConfirmed,

    /// A quantity of zero (or otherwise unusable) was supplied.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    /// A line discount larger than the line subtotal.
    #[error("Line discount {discount} exceeds line subtotal {subtotal}")]
    DiscountExceedsSubtotal { discount: i64, subtotal: i64 },

    /// Order money fields would produce a negative total.
    #[error("Order total would be negative: {total_cents} cents")]
    NegativeTotal { total_cents: i64 },

    /// Referenced line item does not belong to the order.
    #[error("Line item not found: {0}")]
    LineItemNotFound(LineItemId),

    /// Refund request exceeds the remaining refundable quantity.
    #[error(
        "Refund quantity {requested} exceeds refundable quantity {refundable} for line {line_item_id}"
    )]
    RefundQuantityExceeded {
        line_item_id: LineItemId,
        requested: u32,
        refundable: u32,
    },

    /// Shipment covers more units than remain unshipped on a line.
    #[error("Shipment quantity {requested} exceeds unshipped quantity {remaining} for line {line_item_id}")]
    ShipmentQuantityExceeded {
        line_item_id: LineItemId,
        requested: u32,
        remaining: u32,
    },
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
