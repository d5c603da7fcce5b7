//! # Stock Audit Repository
//!
//! Append-only ledger of stock movements. Each audit has a header and one
//! item per product line; `new_quantity = previous_quantity + adjustment`
//! is enforced by the schema.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use tally_core::{StockAudit, StockAuditItem};

pub struct StockAuditRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StockAuditRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        StockAuditRepository { conn }
    }

    pub async fn insert_audit(
        &mut self,
        shop_id: Option<&str>,
        purchase_order_id: Option<&str>,
        note: &str,
    ) -> DbResult<StockAudit> {
        let audit = StockAudit {
            id: new_id(),
            shop_id: shop_id.map(str::to_string),
            purchase_order_id: purchase_order_id.map(str::to_string),
            note: note.to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %audit.id, note = %audit.note, "Inserting stock audit");

        sqlx::query(
            r#"
            INSERT INTO stock_audits (id, shop_id, purchase_order_id, note, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&audit.id)
        .bind(&audit.shop_id)
        .bind(&audit.purchase_order_id)
        .bind(&audit.note)
        .bind(audit.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(audit)
    }

    pub async fn insert_item(
        &mut self,
        audit_id: &str,
        product_id: &str,
        previous_quantity: i64,
        new_quantity: i64,
    ) -> DbResult<StockAuditItem> {
        let item = StockAuditItem {
            id: new_id(),
            audit_id: audit_id.to_string(),
            product_id: product_id.to_string(),
            previous_quantity,
            new_quantity,
            adjustment: new_quantity - previous_quantity,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_audit_items (
                id, audit_id, product_id, previous_quantity, new_quantity, adjustment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.audit_id)
        .bind(&item.product_id)
        .bind(item.previous_quantity)
        .bind(item.new_quantity)
        .bind(item.adjustment)
        .execute(&mut *self.conn)
        .await?;

        Ok(item)
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<StockAudit>> {
        let audit = sqlx::query_as::<_, StockAudit>("SELECT * FROM stock_audits WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(audit)
    }

    pub async fn items_for_audit(&mut self, audit_id: &str) -> DbResult<Vec<StockAuditItem>> {
        let items = sqlx::query_as::<_, StockAuditItem>(
            "SELECT * FROM stock_audit_items WHERE audit_id = ?1 ORDER BY rowid",
        )
        .bind(audit_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }

    /// The audit written when `purchase_order_id` was received, if any.
    pub async fn find_by_purchase_order(
        &mut self,
        purchase_order_id: &str,
    ) -> DbResult<Option<StockAudit>> {
        let audit = sqlx::query_as::<_, StockAudit>(
            "SELECT * FROM stock_audits WHERE purchase_order_id = ?1 ORDER BY rowid LIMIT 1",
        )
        .bind(purchase_order_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(audit)
    }

    /// Audits newest first. `None` lists every shop.
    pub async fn list(&mut self, shop_id: Option<&str>) -> DbResult<Vec<StockAudit>> {
        let audits = sqlx::query_as::<_, StockAudit>(
            r#"
            SELECT * FROM stock_audits
            WHERE (?1 IS NULL OR shop_id = ?1)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(shop_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(audits)
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_audits")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::{NewProduct, ProductRepository};
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_audit_with_items() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let product = ProductRepository::new(&mut conn)
            .insert(&NewProduct {
                shop_id: None,
                category_id: None,
                name: "Vitamin C".to_string(),
                sku: "VIT-C".to_string(),
                price_cents: 3500,
                cost_cents: 2000,
                stock_quantity: 120,
                low_stock_threshold: 10,
            })
            .await
            .unwrap();

        let mut repo = StockAuditRepository::new(&mut conn);
        let audit = repo.insert_audit(None, None, "Shelf count").await.unwrap();
        let item = repo.insert_item(&audit.id, &product.id, 120, 118).await.unwrap();
        assert_eq!(item.adjustment, -2);

        assert_eq!(repo.items_for_audit(&audit.id).await.unwrap(), vec![item]);
        assert_eq!(repo.list(None).await.unwrap().len(), 1);
        assert!(repo.list(Some("other-shop")).await.unwrap().is_empty());
        assert!(repo.find_by_purchase_order("none").await.unwrap().is_none());
    }
}
