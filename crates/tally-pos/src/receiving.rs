//! # Purchase Receiving Workflow
//!
//! Books the goods of a purchase order into stock.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ONE TRANSACTION                                                        │
//! │                                                                         │
//! │  1. UPDATE purchase_orders SET status = 'received'                      │
//! │       WHERE id = ? AND status = 'ordered'                               │
//! │       0 rows → order missing?  NotFound                                 │
//! │              → else            InvalidTransition (already received)     │
//! │                                                                         │
//! │  2. per line: adjust_stock(+qty) → new quantity                         │
//! │               previous = new - qty                                      │
//! │                                                                         │
//! │  3. lines > 0 → one stock_audits row (order's shop, note)               │
//! │                 + one stock_audit_items row per line                    │
//! │                                                                         │
//! │  COMMIT ← status, stock and audit together or not at all                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status guard runs first. Two concurrent receives of one order race on
//! that single UPDATE, so only one of them ever touches stock.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use ts_rs::TS;

use tally_core::validation::validate_id;
use tally_core::{PurchaseOrder, PurchaseOrderStatus, StockAudit, StockAuditItem};
use tally_db::{Database, DbError, ProductRepository, PurchaseOrderRepository, StockAuditRepository};

use crate::error::{PosError, PosResult};

/// A stock audit with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAuditDetail {
    pub audit: StockAudit,
    pub items: Vec<StockAuditItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceivingOutcome {
    pub order: PurchaseOrder,
    /// Absent when the order had no lines.
    pub audit: Option<StockAuditDetail>,
}

pub struct ReceivingService {
    db: Arc<Database>,
}

impl ReceivingService {
    pub fn new(db: Arc<Database>) -> Self {
        ReceivingService { db }
    }

    /// Receives a purchase order.
    ///
    /// ## Errors
    /// * `NotFound` - no such order, or a line references a missing product
    /// * `InvalidTransition` - the order is not in `ordered` status
    /// * `Persistence` - any other store failure; nothing is written
    #[instrument(skip(self))]
    pub async fn receive_purchase_order(&self, order_id: &str) -> PosResult<ReceivingOutcome> {
        validate_id("order_id", order_id)?;

        let mut tx = self.db.begin().await?;

        if !PurchaseOrderRepository::new(&mut tx).mark_received(order_id).await? {
            let current = PurchaseOrderRepository::new(&mut tx)
                .get_by_id(order_id)
                .await?
                .ok_or_else(|| PosError::not_found("PurchaseOrder", order_id))?;

            return Err(PosError::InvalidTransition {
                entity: "PurchaseOrder".to_string(),
                id: order_id.to_string(),
                from: current.status.as_str().to_string(),
                to: PurchaseOrderStatus::Received.as_str().to_string(),
            });
        }

        let lines = PurchaseOrderRepository::new(&mut tx)
            .items_for_order(order_id)
            .await?;

        let mut movements = Vec::with_capacity(lines.len());
        for line in &lines {
            let new_quantity = ProductRepository::new(&mut tx)
                .adjust_stock(&line.product_id, line.quantity)
                .await?;
            let previous_quantity = new_quantity - line.quantity;

            debug!(
                product_id = %line.product_id,
                previous_quantity,
                new_quantity,
                "Stock received"
            );
            movements.push((line.product_id.as_str(), previous_quantity, new_quantity));
        }

        let order = PurchaseOrderRepository::new(&mut tx)
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| PosError::not_found("PurchaseOrder", order_id))?;

        let audit = if movements.is_empty() {
            None
        } else {
            let audit = StockAuditRepository::new(&mut tx)
                .insert_audit(
                    order.shop_id.as_deref(),
                    Some(order_id),
                    &format!("Received purchase order {order_id}"),
                )
                .await?;

            let mut items = Vec::with_capacity(movements.len());
            for (product_id, previous, new) in movements {
                let item = StockAuditRepository::new(&mut tx)
                    .insert_item(&audit.id, product_id, previous, new)
                    .await?;
                items.push(item);
            }

            Some(StockAuditDetail { audit, items })
        };

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id = %order_id,
            lines = lines.len(),
            audit_id = ?audit.as_ref().map(|a| a.audit.id.as_str()),
            "Purchase order received"
        );

        Ok(ReceivingOutcome { order, audit })
    }
}
