//! # Loyalty Outbox Processor
//!
//! Applies `loyalty_accrual` outbox entries to customers, exactly once per sale.
//!
//! ## Processing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Processor Flow                                │
//! │                                                                         │
//! │  checkout tx ──► outbox row (pending) ──► COMMIT                        │
//! │                        │                                                │
//! │        ┌───────────────┴────────────────┐                               │
//! │        ▼                                ▼                               │
//! │  apply_entry() right after       drain_once() on an interval            │
//! │  checkout (best effort)          (tally-outbox-worker)                  │
//! │        │                                │                               │
//! │        └───────────────┬────────────────┘                               │
//! │                        ▼                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ONE TRANSACTION                                                │   │
//! │  │  1. INSERT OR IGNORE loyalty_ledger(sale_id)                    │   │
//! │  │  2. inserted? → customers.total_spent += amount,                │   │
//! │  │                 customers.loyalty_points += points              │   │
//! │  │  3. outbox.processed_at = now                                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Failure → attempts += 1, last_error recorded, retried next poll.       │
//! │  After max_attempts the entry is skipped and logged.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both paths may race on the same entry. The ledger primary key makes the
//! loser a no-op, so points never double.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use tally_core::{LoyaltyAccrual, OUTBOX_KIND_LOYALTY_ACCRUAL};
use tally_db::{
    CustomerRepository, Database, DbError, LoyaltyLedgerRepository, OutboxRepository,
};

use crate::config::OutboxSettings;
use crate::error::{PosError, PosResult};

/// What applying one entry did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The accrual was credited to the customer by this call.
    Applied,
    /// The entry or its sale had already been handled.
    AlreadyApplied,
    /// The entry kind has no handler; it was marked processed.
    Ignored,
}

/// Counts from one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    pub applied: usize,
    pub already_applied: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct OutboxProcessor {
    db: Arc<Database>,
    settings: OutboxSettings,
}

impl OutboxProcessor {
    pub fn new(db: Arc<Database>, settings: OutboxSettings) -> Self {
        OutboxProcessor { db, settings }
    }

    /// Applies one outbox entry in its own transaction.
    #[instrument(skip(self))]
    pub async fn apply_entry(&self, entry_id: &str) -> PosResult<ApplyOutcome> {
        let mut tx = self.db.begin().await?;

        let entry = OutboxRepository::new(&mut tx)
            .get_by_id(entry_id)
            .await?
            .ok_or_else(|| PosError::not_found("OutboxEntry", entry_id))?;

        if entry.processed_at.is_some() {
            debug!(entry_id = %entry_id, "Outbox entry already processed");
            return Ok(ApplyOutcome::AlreadyApplied);
        }

        let outcome = match entry.kind.as_str() {
            OUTBOX_KIND_LOYALTY_ACCRUAL => {
                let accrual: LoyaltyAccrual =
                    serde_json::from_str(&entry.payload).map_err(DbError::from)?;

                if LoyaltyLedgerRepository::new(&mut tx).record(&accrual).await? {
                    let customer = CustomerRepository::new(&mut tx)
                        .add_loyalty(&accrual.customer_id, accrual.amount_cents, accrual.points)
                        .await?;
                    info!(
                        sale_id = %accrual.sale_id,
                        customer_id = %customer.id,
                        points = accrual.points,
                        balance = customer.loyalty_points,
                        "Loyalty accrued"
                    );
                    ApplyOutcome::Applied
                } else {
                    debug!(sale_id = %accrual.sale_id, "Loyalty already recorded for sale");
                    ApplyOutcome::AlreadyApplied
                }
            }
            other => {
                warn!(entry_id = %entry_id, kind = %other, "No handler for outbox entry kind");
                ApplyOutcome::Ignored
            }
        };

        OutboxRepository::new(&mut tx).mark_processed(entry_id).await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(outcome)
    }

    /// Applies up to one batch of pending entries.
    pub async fn drain_once(&self) -> PosResult<DrainReport> {
        let pending = {
            let mut conn = self.db.acquire().await?;
            OutboxRepository::new(&mut conn)
                .pending(self.settings.batch_size, self.settings.max_attempts)
                .await?
        };

        let mut report = DrainReport::default();

        for entry in pending {
            match self.apply_entry(&entry.id).await {
                Ok(ApplyOutcome::Applied) => report.applied += 1,
                Ok(_) => report.already_applied += 1,
                Err(e) => {
                    report.failed += 1;
                    let attempts = entry.attempts + 1;

                    if let Err(record_err) = self.record_failure(&entry.id, &e.to_string()).await {
                        error!(
                            entry_id = %entry.id,
                            error = %e,
                            record_error = %record_err,
                            "Could not record outbox failure, continuing with batch"
                        );
                        continue;
                    }

                    if attempts >= i64::from(self.settings.max_attempts) {
                        error!(
                            entry_id = %entry.id,
                            aggregate_id = %entry.aggregate_id,
                            attempts,
                            error = %e,
                            "Outbox entry exhausted its attempts, skipping"
                        );
                    } else {
                        warn!(entry_id = %entry.id, attempts, error = %e, "Outbox entry failed");
                    }
                }
            }
        }

        if report != DrainReport::default() {
            info!(
                applied = report.applied,
                already_applied = report.already_applied,
                failed = report.failed,
                "Outbox drain complete"
            );
        }

        Ok(report)
    }

    async fn record_failure(&self, entry_id: &str, error: &str) -> PosResult<()> {
        let mut conn = self.db.acquire().await?;
        OutboxRepository::new(&mut conn).mark_failed(entry_id, error).await?;
        Ok(())
    }

    pub async fn pending_count(&self) -> PosResult<i64> {
        let mut conn = self.db.acquire().await?;
        Ok(OutboxRepository::new(&mut conn).count_pending().await?)
    }

    /// Drains the outbox every poll interval until `shutdown` flips to true
    /// or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.poll_interval_secs,
            batch_size = self.settings.batch_size,
            "Outbox processor starting"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.drain_once().await {
                        error!(error = %e, "Outbox drain failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Outbox processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use tally_core::PaymentMethod;
    use tally_db::{NewSale, SaleRepository};

    async fn pending_accrual(fx: &Fixture, customer_id: &str) -> String {
        let mut tx = fx.db.begin().await.unwrap();
        let sale = SaleRepository::new(&mut tx)
            .insert_sale(&NewSale {
                shop_id: Some(fx.shop_id.clone()),
                staff_id: None,
                customer_id: Some(customer_id.to_string()),
                subtotal_cents: 2400,
                discount_cents: 0,
                tax_cents: 120,
                total_cents: 2520,
                payment_method: PaymentMethod::Cash,
            })
            .await
            .unwrap();
        let entry = OutboxRepository::new(&mut tx)
            .enqueue(
                OUTBOX_KIND_LOYALTY_ACCRUAL,
                &sale.id,
                &LoyaltyAccrual {
                    sale_id: sale.id.clone(),
                    customer_id: customer_id.to_string(),
                    amount_cents: 2520,
                    points: 2,
                },
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
        entry.id
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let fx = Fixture::new().await;
        let entry_id = pending_accrual(&fx, &fx.customer_id).await;
        let processor = fx.outbox_processor();

        assert_eq!(processor.apply_entry(&entry_id).await.unwrap(), ApplyOutcome::Applied);
        assert_eq!(
            processor.apply_entry(&entry_id).await.unwrap(),
            ApplyOutcome::AlreadyApplied
        );

        let customer = fx.customer(&fx.customer_id).await;
        assert_eq!(customer.loyalty_points, 2);
        assert_eq!(customer.total_spent_cents, 2520);
        assert_eq!(processor.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ledger_blocks_double_credit_from_duplicate_entries() {
        let fx = Fixture::new().await;
        let entry_id = pending_accrual(&fx, &fx.customer_id).await;

        // A second entry for the same sale, e.g. enqueued twice.
        let duplicate = {
            let mut conn = fx.db.acquire().await.unwrap();
            let original = OutboxRepository::new(&mut conn)
                .get_by_id(&entry_id)
                .await
                .unwrap()
                .unwrap();
            let accrual: LoyaltyAccrual = serde_json::from_str(&original.payload).unwrap();
            OutboxRepository::new(&mut conn)
                .enqueue(OUTBOX_KIND_LOYALTY_ACCRUAL, &accrual.sale_id, &accrual)
                .await
                .unwrap()
                .id
        };

        let report = fx.outbox_processor().drain_once().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(report.already_applied, 1);
        assert!(!duplicate.is_empty());

        assert_eq!(fx.customer(&fx.customer_id).await.loyalty_points, 2);
    }

    /// An entry that can never apply: its customer does not exist.
    async fn orphan_accrual(fx: &Fixture, sale_id: &str) -> String {
        let mut conn = fx.db.acquire().await.unwrap();
        OutboxRepository::new(&mut conn)
            .enqueue(
                OUTBOX_KIND_LOYALTY_ACCRUAL,
                sale_id,
                &LoyaltyAccrual {
                    sale_id: sale_id.to_string(),
                    customer_id: "ghost".to_string(),
                    amount_cents: 100,
                    points: 0,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_failed_entry_is_retried_later() {
        let fx = Fixture::new().await;
        orphan_accrual(&fx, "sale-x").await;

        let processor = fx.outbox_processor();
        let report = processor.drain_once().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(processor.pending_count().await.unwrap(), 1);

        let mut conn = fx.db.acquire().await.unwrap();
        let entries = OutboxRepository::new(&mut conn).pending(10, 10).await.unwrap();
        assert_eq!(entries[0].attempts, 1);
        assert!(entries[0].last_error.is_some());
    }

    #[tokio::test]
    async fn test_unrecordable_failure_does_not_abandon_batch() {
        let fx = Fixture::new().await;
        orphan_accrual(&fx, "sale-x").await;
        orphan_accrual(&fx, "sale-y").await;
        fx.execute(
            "CREATE TRIGGER lock_outbox BEFORE UPDATE ON outbox \
             BEGIN SELECT RAISE(ABORT, 'outbox is read-only'); END",
        )
        .await;

        let processor = fx.outbox_processor();
        let report = processor.drain_once().await.unwrap();
        assert_eq!(report.failed, 2);

        let mut conn = fx.db.acquire().await.unwrap();
        let entries = OutboxRepository::new(&mut conn).pending(10, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.attempts == 0));
        drop(conn);

        fx.execute("DROP TRIGGER lock_outbox").await;
        let report = processor.drain_once().await.unwrap();
        assert_eq!(report.failed, 2);

        let mut conn = fx.db.acquire().await.unwrap();
        let entries = OutboxRepository::new(&mut conn).pending(10, 10).await.unwrap();
        assert!(entries.iter().all(|e| e.attempts == 1));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let fx = Fixture::new().await;
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(fx.outbox_processor().run(rx));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
