//! Inventory reservation ledger.
//!
//! Reservable stock is tracked as an append-only sequence of signed ledger
//! entries rather than a mutable counter: the reserved quantity for a SKU is
//! always the sum of its reserve/release/commit deltas, and the on-hand
//! quantity is the stocked base adjusted by commit/restock deltas. A failed
//! reservation is a typed, retryable [`LedgerError::InsufficientStock`],
//! never a torn write.

pub mod entry;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;

pub use entry::{LedgerEntry, LedgerReason};
pub use error::{LedgerError, Result};
pub use ledger::InventoryLedger;
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
