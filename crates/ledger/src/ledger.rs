//! The inventory ledger trait.

use async_trait::async_trait;
use common::{OrderId, Sku};

use crate::entry::LedgerEntry;
use crate::error::Result;

/// Atomic reserve/release/commit/restock operations over per-SKU stock.
///
/// Implementations must make `reserve` a single atomic check-and-append:
/// reading the available quantity and writing the reservation entry under one
/// lock (in memory) or one row-locked transaction (PostgreSQL), so two
/// concurrent checkouts for the last units cannot both succeed.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Sets the stocked base quantity for a SKU, creating it if needed.
    async fn set_on_hand(&self, sku: &Sku, quantity: i64) -> Result<()>;

    /// Returns the on-hand quantity: stocked base plus commit/restock deltas.
    async fn on_hand(&self, sku: &Sku) -> Result<i64>;

    /// Returns the reserved quantity: the sum of reserve/release/commit deltas.
    async fn reserved(&self, sku: &Sku) -> Result<i64>;

    /// Returns `on_hand - reserved`, the quantity open to new reservations.
    async fn available(&self, sku: &Sku) -> Result<i64>;

    /// Places a hold on `quantity` units for an order.
    ///
    /// Fails with [`crate::LedgerError::InsufficientStock`] when fewer than
    /// `quantity` units are available.
    async fn reserve(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()>;

    /// Returns a hold without shipping (cancellation or rolled-back checkout).
    async fn release(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()>;

    /// Converts a hold into a stock decrement at shipment time.
    async fn commit(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()>;

    /// Returns refunded units to stock.
    async fn restock(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()>;

    /// Returns every ledger entry recorded for an order, oldest first.
    async fn entries_for_order(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>>;
}
