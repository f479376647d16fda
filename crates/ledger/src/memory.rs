//! In-memory ledger implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, Sku};
use tokio::sync::RwLock;

use crate::entry::{LedgerEntry, LedgerReason};
use crate::error::{LedgerError, Result};
use crate::ledger::InventoryLedger;

#[derive(Default)]
struct LedgerState {
    stocked: HashMap<Sku, i64>,
    entries: Vec<LedgerEntry>,
}

impl LedgerState {
    fn reserved(&self, sku: &Sku) -> i64 {
        self.entries
            .iter()
            .filter(|e| &e.sku == sku && e.reason.affects_reservation())
            .map(|e| e.delta)
            .sum()
    }

    fn on_hand(&self, sku: &Sku) -> Result<i64> {
        let base = self
            .stocked
            .get(sku)
            .copied()
            .ok_or_else(|| LedgerError::UnknownSku(sku.clone()))?;
        let adjustment: i64 = self
            .entries
            .iter()
            .filter(|e| &e.sku == sku && e.reason.affects_on_hand())
            .map(|e| e.delta)
            .sum();
        Ok(base + adjustment)
    }

    fn reserved_for_order(&self, sku: &Sku, order_id: OrderId) -> i64 {
        self.entries
            .iter()
            .filter(|e| &e.sku == sku && e.order_id == order_id && e.reason.affects_reservation())
            .map(|e| e.delta)
            .sum()
    }
}

/// In-memory inventory ledger.
///
/// All derived quantities are recomputed from the entry list on each call;
/// the single write lock makes the availability check and the entry append
/// one atomic step.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of ledger entries.
    pub async fn entry_count(&self) -> usize {
        self.state.read().await.entries.len()
    }
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn set_on_hand(&self, sku: &Sku, quantity: i64) -> Result<()> {
        let mut state = self.state.write().await;
        state.stocked.insert(sku.clone(), quantity);
        Ok(())
    }

    async fn on_hand(&self, sku: &Sku) -> Result<i64> {
        self.state.read().await.on_hand(sku)
    }

    async fn reserved(&self, sku: &Sku) -> Result<i64> {
        Ok(self.state.read().await.reserved(sku))
    }

    async fn available(&self, sku: &Sku) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.on_hand(sku)? - state.reserved(sku))
    }

    #[tracing::instrument(skip(self), fields(sku = %sku))]
    async fn reserve(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let available = state.on_hand(sku)? - state.reserved(sku);
        if (quantity as i64) > available {
            metrics::counter!("ledger_reservations_rejected").increment(1);
            return Err(LedgerError::InsufficientStock {
                sku: sku.clone(),
                requested: quantity,
                available,
            });
        }
        state.entries.push(LedgerEntry::new(
            sku.clone(),
            order_id,
            quantity,
            LedgerReason::Reserve,
        ));
        metrics::counter!("ledger_reservations_total").increment(1);
        Ok(())
    }

    async fn release(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let held = state.reserved_for_order(sku, order_id);
        if (quantity as i64) > held {
            return Err(LedgerError::ReservationExceeded {
                sku: sku.clone(),
                requested: quantity,
                reserved: held,
            });
        }
        state.entries.push(LedgerEntry::new(
            sku.clone(),
            order_id,
            quantity,
            LedgerReason::Release,
        ));
        Ok(())
    }

    async fn commit(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let held = state.reserved_for_order(sku, order_id);
        if (quantity as i64) > held {
            return Err(LedgerError::ReservationExceeded {
                sku: sku.clone(),
                requested: quantity,
                reserved: held,
            });
        }
        state.entries.push(LedgerEntry::new(
            sku.clone(),
            order_id,
            quantity,
            LedgerReason::Commit,
        ));
        Ok(())
    }

    async fn restock(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.stocked.contains_key(sku) {
            return Err(LedgerError::UnknownSku(sku.clone()));
        }
        state.entries.push(LedgerEntry::new(
            sku.clone(),
            order_id,
            quantity,
            LedgerReason::Restock,
        ));
        Ok(())
    }

    async fn entries_for_order(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku() -> Sku {
        Sku::new("SKU-001")
    }

    #[tokio::test]
    async fn test_reserve_release_commit_flow() {
        let ledger = InMemoryLedger::new();
        let order = OrderId::new();
        ledger.set_on_hand(&sku(), 5).await.unwrap();

        ledger.reserve(&sku(), order, 3).await.unwrap();
        assert_eq!(ledger.reserved(&sku()).await.unwrap(), 3);
        assert_eq!(ledger.available(&sku()).await.unwrap(), 2);

        // Ship 2, release 1
        ledger.commit(&sku(), order, 2).await.unwrap();
        ledger.release(&sku(), order, 1).await.unwrap();
        assert_eq!(ledger.reserved(&sku()).await.unwrap(), 0);
        assert_eq!(ledger.on_hand(&sku()).await.unwrap(), 3);
        assert_eq!(ledger.available(&sku()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_insufficient_stock() {
        let ledger = InMemoryLedger::new();
        ledger.set_on_hand(&sku(), 2).await.unwrap();

        let result = ledger.reserve(&sku(), OrderId::new(), 3).await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            })
        ));
        assert_eq!(ledger.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_sku() {
        let ledger = InMemoryLedger::new();
        let result = ledger.reserve(&sku(), OrderId::new(), 1).await;
        assert!(matches!(result, Err(LedgerError::UnknownSku(_))));
    }

    #[tokio::test]
    async fn test_release_bounded_by_order_holding() {
        let ledger = InMemoryLedger::new();
        let order_a = OrderId::new();
        let order_b = OrderId::new();
        ledger.set_on_hand(&sku(), 10).await.unwrap();
        ledger.reserve(&sku(), order_a, 4).await.unwrap();
        ledger.reserve(&sku(), order_b, 4).await.unwrap();

        // Order B cannot release units order A holds.
        let result = ledger.release(&sku(), order_b, 5).await;
        assert!(matches!(
            result,
            Err(LedgerError::ReservationExceeded { reserved: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_restock_after_refund() {
        let ledger = InMemoryLedger::new();
        let order = OrderId::new();
        ledger.set_on_hand(&sku(), 5).await.unwrap();
        ledger.reserve(&sku(), order, 2).await.unwrap();
        ledger.commit(&sku(), order, 2).await.unwrap();
        assert_eq!(ledger.on_hand(&sku()).await.unwrap(), 3);

        ledger.restock(&sku(), order, 1).await.unwrap();
        assert_eq!(ledger.on_hand(&sku()).await.unwrap(), 4);
        assert_eq!(ledger.reserved(&sku()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_admit_one_winner() {
        let ledger = InMemoryLedger::new();
        ledger.set_on_hand(&sku(), 5).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger.reserve(&Sku::new("SKU-001"), OrderId::new(), 3).await
            }));
        }

        let mut successes = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(LedgerError::InsufficientStock { .. }) => insufficient += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(insufficient, 1);
        assert_eq!(ledger.reserved(&Sku::new("SKU-001")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_entries_for_order() {
        let ledger = InMemoryLedger::new();
        let order = OrderId::new();
        let other = OrderId::new();
        ledger.set_on_hand(&sku(), 10).await.unwrap();
        ledger.reserve(&sku(), order, 2).await.unwrap();
        ledger.reserve(&sku(), other, 1).await.unwrap();
        ledger.commit(&sku(), order, 2).await.unwrap();

        let entries = ledger.entries_for_order(order).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].reason, LedgerReason::Reserve);
        assert_eq!(entries[1].reason, LedgerReason::Commit);
    }
}
