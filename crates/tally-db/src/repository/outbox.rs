//! # Outbox Repository
//!
//! Side effects that must follow a commit (loyalty accrual) are written to
//! the `outbox` table inside the same transaction as the sale. A processor
//! drains pending entries afterwards.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  enqueue() ──► PENDING ──► apply OK ──► mark_processed() ──► DONE       │
//! │                   ▲            │                                        │
//! │                   │            └── error ──► mark_failed()              │
//! │                   │                              │ attempts += 1        │
//! │                   └──────────────────────────────┘ (until max_attempts) │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use tally_core::OutboxEntry;

pub struct OutboxRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> OutboxRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        OutboxRepository { conn }
    }

    /// Serializes `payload` to JSON and stores a pending entry.
    pub async fn enqueue<T: Serialize>(
        &mut self,
        kind: &str,
        aggregate_id: &str,
        payload: &T,
    ) -> DbResult<OutboxEntry> {
        let entry = OutboxEntry {
            id: new_id(),
            kind: kind.to_string(),
            aggregate_id: aggregate_id.to_string(),
            payload: serde_json::to_string(payload)?,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            processed_at: None,
        };

        debug!(id = %entry.id, kind = %entry.kind, aggregate_id = %entry.aggregate_id, "Enqueuing outbox entry");

        sqlx::query(
            r#"
            INSERT INTO outbox (id, kind, aggregate_id, payload, attempts, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.kind)
        .bind(&entry.aggregate_id)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(entry)
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<OutboxEntry>> {
        let entry = sqlx::query_as::<_, OutboxEntry>("SELECT * FROM outbox WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(entry)
    }

    /// Unprocessed entries below the attempt ceiling, oldest first.
    pub async fn pending(&mut self, limit: u32, max_attempts: u32) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT * FROM outbox
            WHERE processed_at IS NULL AND attempts < ?2
            ORDER BY created_at, rowid
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .bind(max_attempts)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(entries)
    }

    pub async fn mark_processed(&mut self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE outbox
            SET processed_at = ?2, attempted_at = ?2, attempts = attempts + 1, last_error = NULL
            WHERE id = ?1 AND processed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn mark_failed(&mut self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE outbox
            SET attempts = attempts + 1, last_error = ?2, attempted_at = ?3
            WHERE id = ?1 AND processed_at IS NULL
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn count_pending(&mut self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE processed_at IS NULL")
                .fetch_one(&mut *self.conn)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use tally_core::{LoyaltyAccrual, OUTBOX_KIND_LOYALTY_ACCRUAL};

    fn accrual() -> LoyaltyAccrual {
        LoyaltyAccrual {
            sale_id: "sale-1".to_string(),
            customer_id: "customer-1".to_string(),
            amount_cents: 2520,
            points: 2,
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_process() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = OutboxRepository::new(&mut conn);

        let entry = repo
            .enqueue(OUTBOX_KIND_LOYALTY_ACCRUAL, "sale-1", &accrual())
            .await
            .unwrap();
        let decoded: LoyaltyAccrual = serde_json::from_str(&entry.payload).unwrap();
        assert_eq!(decoded, accrual());

        assert_eq!(repo.pending(10, 5).await.unwrap().len(), 1);
        repo.mark_processed(&entry.id).await.unwrap();
        assert!(repo.pending(10, 5).await.unwrap().is_empty());
        assert_eq!(repo.count_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failures_hit_attempt_ceiling() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = OutboxRepository::new(&mut conn);
        let entry = repo
            .enqueue(OUTBOX_KIND_LOYALTY_ACCRUAL, "sale-1", &accrual())
            .await
            .unwrap();

        repo.mark_failed(&entry.id, "database is locked").await.unwrap();
        repo.mark_failed(&entry.id, "database is locked").await.unwrap();

        let stored = repo.get_by_id(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 2);
        assert_eq!(stored.last_error.as_deref(), Some("database is locked"));
        assert!(stored.attempted_at.is_some());

        assert_eq!(repo.pending(10, 3).await.unwrap().len(), 1);
        assert!(repo.pending(10, 2).await.unwrap().is_empty());
        assert_eq!(repo.count_pending().await.unwrap(), 1);
    }
}
