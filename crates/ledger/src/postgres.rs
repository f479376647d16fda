//! PostgreSQL-backed ledger implementation.

use async_trait::async_trait;
use common::{OrderId, Sku};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::entry::{LedgerEntry, LedgerReason};
use crate::error::{LedgerError, Result};
use crate::ledger::InventoryLedger;

const RESERVATION_REASONS: &str = "('reserve', 'release', 'commit')";
const ON_HAND_REASONS: &str = "('commit', 'restock')";

/// PostgreSQL inventory ledger.
///
/// `reserve` runs inside one transaction holding a `FOR UPDATE` lock on the
/// stock row; the reserved sum is recomputed from the entries table under
/// that lock, so concurrent reservations serialize on the row and exactly one
/// wins the last units.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_entry(row: PgRow) -> Result<LedgerEntry> {
        let reason_str: String = row.try_get("reason")?;
        let reason =
            LedgerReason::parse(&reason_str).ok_or(LedgerError::UnknownReason(reason_str))?;
        Ok(LedgerEntry {
            id: row.try_get::<Uuid, _>("id")?,
            sku: Sku::new(row.try_get::<String, _>("sku")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            delta: row.try_get("delta")?,
            reason,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_entry<'e, E>(executor: E, entry: &LedgerEntry) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, sku, order_id, delta, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.sku.as_str())
        .bind(entry.order_id.as_uuid())
        .bind(entry.delta)
        .bind(entry.reason.as_str())
        .bind(entry.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Appends a release/commit entry after verifying the order's holding,
    /// all under a row lock on the SKU.
    async fn append_against_holding(
        &self,
        sku: &Sku,
        order_id: OrderId,
        quantity: u32,
        reason: LedgerReason,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let stocked: Option<i64> =
            sqlx::query_scalar("SELECT stocked FROM stock_levels WHERE sku = $1 FOR UPDATE")
                .bind(sku.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        if stocked.is_none() {
            return Err(LedgerError::UnknownSku(sku.clone()));
        }

        let held: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM ledger_entries \
             WHERE sku = $1 AND order_id = $2 AND reason IN {RESERVATION_REASONS}"
        ))
        .bind(sku.as_str())
        .bind(order_id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;

        if (quantity as i64) > held {
            return Err(LedgerError::ReservationExceeded {
                sku: sku.clone(),
                requested: quantity,
                reserved: held,
            });
        }

        let entry = LedgerEntry::new(sku.clone(), order_id, quantity, reason);
        Self::insert_entry(&mut *tx, &entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn sum_for_sku(&self, sku: &Sku, reasons: &str) -> Result<i64> {
        let sum: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM ledger_entries \
             WHERE sku = $1 AND reason IN {reasons}"
        ))
        .bind(sku.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    async fn stocked(&self, sku: &Sku) -> Result<i64> {
        sqlx::query_scalar("SELECT stocked FROM stock_levels WHERE sku = $1")
            .bind(sku.as_str())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| LedgerError::UnknownSku(sku.clone()))
    }
}

#[async_trait]
impl InventoryLedger for PostgresLedger {
    async fn set_on_hand(&self, sku: &Sku, quantity: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_levels (sku, stocked)
            VALUES ($1, $2)
            ON CONFLICT (sku) DO UPDATE SET stocked = EXCLUDED.stocked
            "#,
        )
        .bind(sku.as_str())
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn on_hand(&self, sku: &Sku) -> Result<i64> {
        let base = self.stocked(sku).await?;
        let adjustment = self.sum_for_sku(sku, ON_HAND_REASONS).await?;
        Ok(base + adjustment)
    }

    async fn reserved(&self, sku: &Sku) -> Result<i64> {
        self.sum_for_sku(sku, RESERVATION_REASONS).await
    }

    async fn available(&self, sku: &Sku) -> Result<i64> {
        Ok(self.on_hand(sku).await? - self.reserved(sku).await?)
    }

    #[tracing::instrument(skip(self), fields(sku = %sku))]
    async fn reserve(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent reservations of the same SKU.
        let stocked: Option<i64> =
            sqlx::query_scalar("SELECT stocked FROM stock_levels WHERE sku = $1 FOR UPDATE")
                .bind(sku.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let stocked = stocked.ok_or_else(|| LedgerError::UnknownSku(sku.clone()))?;

        let reserved: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM ledger_entries \
             WHERE sku = $1 AND reason IN {RESERVATION_REASONS}"
        ))
        .bind(sku.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let adjustment: i64 = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(delta), 0)::BIGINT FROM ledger_entries \
             WHERE sku = $1 AND reason IN {ON_HAND_REASONS}"
        ))
        .bind(sku.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let available = stocked + adjustment - reserved;
        if (quantity as i64) > available {
            metrics::counter!("ledger_reservations_rejected").increment(1);
            return Err(LedgerError::InsufficientStock {
                sku: sku.clone(),
                requested: quantity,
                available,
            });
        }

        let entry = LedgerEntry::new(sku.clone(), order_id, quantity, LedgerReason::Reserve);
        Self::insert_entry(&mut *tx, &entry).await?;
        tx.commit().await?;

        metrics::counter!("ledger_reservations_total").increment(1);
        Ok(())
    }

    async fn release(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        self.append_against_holding(sku, order_id, quantity, LedgerReason::Release)
            .await
    }

    async fn commit(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        self.append_against_holding(sku, order_id, quantity, LedgerReason::Commit)
            .await
    }

    async fn restock(&self, sku: &Sku, order_id: OrderId, quantity: u32) -> Result<()> {
        // Existence check only; restock is not bounded by a reservation.
        self.stocked(sku).await?;
        let entry = LedgerEntry::new(sku.clone(), order_id, quantity, LedgerReason::Restock);
        Self::insert_entry(&self.pool, &entry).await
    }

    async fn entries_for_order(&self, order_id: OrderId) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, sku, order_id, delta, reason, created_at
            FROM ledger_entries
            WHERE order_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
