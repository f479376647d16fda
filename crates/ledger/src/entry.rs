//! Ledger entry types.

use chrono::{DateTime, Utc};
use common::{OrderId, Sku};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a ledger entry exists, and which derived quantity its delta feeds.
///
/// Reservation sum = Σ deltas of `Reserve` + `Release` + `Commit`.
/// On-hand adjustment = Σ deltas of `Commit` + `Restock`.
/// A `Commit` entry carries a negative delta: it both consumes the
/// reservation and removes the units from stock at shipment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Stock put on hold for an order at checkout.
    Reserve,
    /// A hold returned without shipping (cancellation, failed checkout).
    Release,
    /// A hold converted into a stock decrement at shipment.
    Commit,
    /// Refunded units returned to stock.
    Restock,
}

impl LedgerReason {
    /// Returns true if this reason's delta counts toward the reservation sum.
    pub fn affects_reservation(&self) -> bool {
        matches!(
            self,
            LedgerReason::Reserve | LedgerReason::Release | LedgerReason::Commit
        )
    }

    /// Returns true if this reason's delta counts toward the on-hand sum.
    pub fn affects_on_hand(&self) -> bool {
        matches!(self, LedgerReason::Commit | LedgerReason::Restock)
    }

    /// Returns the reason name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerReason::Reserve => "reserve",
            LedgerReason::Release => "release",
            LedgerReason::Commit => "commit",
            LedgerReason::Restock => "restock",
        }
    }

    /// Parses a reason from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reserve" => Some(LedgerReason::Reserve),
            "release" => Some(LedgerReason::Release),
            "commit" => Some(LedgerReason::Commit),
            "restock" => Some(LedgerReason::Restock),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only ledger row linking a stock unit to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub sku: Sku,
    pub order_id: OrderId,
    /// Signed quantity delta; sign is determined by the reason.
    pub delta: i64,
    pub reason: LedgerReason,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Creates an entry with the conventional sign for its reason.
    pub fn new(sku: Sku, order_id: OrderId, quantity: u32, reason: LedgerReason) -> Self {
        let magnitude = quantity as i64;
        let delta = match reason {
            LedgerReason::Reserve | LedgerReason::Restock => magnitude,
            LedgerReason::Release | LedgerReason::Commit => -magnitude,
        };
        Self {
            id: Uuid::new_v4(),
            sku,
            order_id,
            delta,
            reason,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_signs_by_reason() {
        let order = OrderId::new();
        let sku = Sku::new("SKU-001");

        let reserve = LedgerEntry::new(sku.clone(), order, 3, LedgerReason::Reserve);
        assert_eq!(reserve.delta, 3);

        let release = LedgerEntry::new(sku.clone(), order, 3, LedgerReason::Release);
        assert_eq!(release.delta, -3);

        let commit = LedgerEntry::new(sku.clone(), order, 2, LedgerReason::Commit);
        assert_eq!(commit.delta, -2);

        let restock = LedgerEntry::new(sku, order, 1, LedgerReason::Restock);
        assert_eq!(restock.delta, 1);
    }

    #[test]
    fn test_reason_partitioning() {
        assert!(LedgerReason::Reserve.affects_reservation());
        assert!(LedgerReason::Release.affects_reservation());
        assert!(LedgerReason::Commit.affects_reservation());
        assert!(!LedgerReason::Restock.affects_reservation());

        assert!(LedgerReason::Commit.affects_on_hand());
        assert!(LedgerReason::Restock.affects_on_hand());
        assert!(!LedgerReason::Reserve.affects_on_hand());
    }

    #[test]
    fn test_reason_string_roundtrip() {
        for reason in [
            LedgerReason::Reserve,
            LedgerReason::Release,
            LedgerReason::Commit,
            LedgerReason::Restock,
        ] {
            assert_eq!(LedgerReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(LedgerReason::parse("unknown"), None);
    }
}
