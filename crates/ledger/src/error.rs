//! Ledger error types.

use common::Sku;
use thiserror::Error;

/// Errors that can occur when interacting with the inventory ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Not enough available stock to honor a reservation.
    ///
    /// Retryable by the caller after re-quoting the cart; the check and the
    /// append happen atomically, so concurrent reservations of the same units
    /// admit exactly one winner.
    #[error("Insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: u32,
        available: i64,
    },

    /// A release/commit exceeding what the order actually holds.
    #[error("Order holds {reserved} reserved units of {sku}, cannot apply {requested}")]
    ReservationExceeded {
        sku: Sku,
        requested: u32,
        reserved: i64,
    },

    /// The SKU has never been stocked.
    #[error("Unknown SKU: {0}")]
    UnknownSku(Sku),

    /// A stored entry carries a reason code this build does not know.
    #[error("Unrecognized ledger reason: {0}")]
    UnknownReason(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
