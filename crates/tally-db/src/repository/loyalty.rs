//! # Loyalty Ledger Repository
//!
//! One row per sale whose accrual has been applied. The primary key on
//! `sale_id` makes re-applying the same outbox entry a no-op.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::DbResult;
use tally_core::LoyaltyAccrual;

pub struct LoyaltyLedgerRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> LoyaltyLedgerRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        LoyaltyLedgerRepository { conn }
    }

    /// Records an accrual.
    ///
    /// ## Returns
    /// `true` if this call recorded it, `false` if the sale was already in
    /// the ledger.
    pub async fn record(&mut self, accrual: &LoyaltyAccrual) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO loyalty_ledger (sale_id, customer_id, points, amount_cents, applied_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&accrual.sale_id)
        .bind(&accrual.customer_id)
        .bind(accrual.points)
        .bind(accrual.amount_cents)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// When the accrual for `sale_id` was applied, if it has been.
    pub async fn applied_at(&mut self, sale_id: &str) -> DbResult<Option<DateTime<Utc>>> {
        let applied: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT applied_at FROM loyalty_ledger WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_optional(&mut *self.conn)
                .await?;

        Ok(applied)
    }
}
