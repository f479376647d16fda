//! Store error types.

use common::{OrderGroupId, OrderId};
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order group does not exist.
    #[error("Order group not found: {0}")]
    GroupNotFound(OrderGroupId),

    /// An order with this ID has already been inserted.
    #[error("Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// A checkout commit with no orders in it.
    #[error("Cannot insert an empty order group")]
    EmptyGroup,

    /// A tracking number resubmitted with different line coverage.
    #[error("Tracking number {tracking_number} was already recorded with different line coverage")]
    ShipmentCoverageMismatch { tracking_number: String },

    /// A guarded update was rejected by a domain invariant.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
