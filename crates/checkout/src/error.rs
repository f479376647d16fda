//! Checkout engine error types.

use common::{LineItemId, Sku};
use domain::DomainError;
use ledger::LedgerError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the checkout, fulfillment, refund and payment services.
///
/// Business failures always name the offending items or quantities; a caller
/// never sees a generic "order failed".
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request was malformed or violated a precondition.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A buyer attempted to purchase their own listings.
    #[error("Buyer cannot purchase their own items: {items:?}")]
    NotAllowed { items: Vec<String> },

    /// Some items do not ship to the destination country.
    #[error("Items cannot ship to {country}: {items:?}")]
    ShippingUnavailable { country: String, items: Vec<String> },

    /// Not enough available stock; retryable after the buyer adjusts the cart.
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: u32,
        available: i64,
    },

    /// A fulfillment-side operation requires confirmed payment.
    #[error("Payment has not been confirmed for this order")]
    PaymentNotConfirmed,

    /// A refund request exceeds what is still refundable on a line.
    #[error(
        "Refund of {requested} exceeds refundable quantity {refundable} on line {line_item_id}"
    )]
    RefundQuantityExceeded {
        line_item_id: LineItemId,
        requested: u32,
        refundable: u32,
    },

    /// The tracking token does not resolve to any order group.
    #[error("Unknown tracking token")]
    UnknownTrackingToken,

    /// An external service (gateway, rate provider) failed; retryable.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// A domain invariant rejected the operation.
    #[error(transparent)]
    Domain(DomainError),

    /// A ledger operation failed outside the insufficient-stock path.
    #[error(transparent)]
    Ledger(LedgerError),

    /// A store operation failed outside the domain-guard path.
    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for CheckoutError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::PaymentNotConfirmed => Self::PaymentNotConfirmed,
            DomainError::RefundQuantityExceeded {
                line_item_id,
                requested,
                refundable,
            } => Self::RefundQuantityExceeded {
                line_item_id,
                requested,
                refundable,
            },
            other => Self::Domain(other),
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock {
                sku,
                requested,
                available,
            } => Self::InsufficientStock {
                sku,
                requested,
                available,
            },
            other => Self::Ledger(other),
        }
    }
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Domain(domain_err) => Self::from(domain_err),
            mismatch @ StoreError::ShipmentCoverageMismatch { .. } => {
                Self::Validation(mismatch.to_string())
            }
            other => Self::Store(other),
        }
    }
}

/// Result type for checkout engine operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
