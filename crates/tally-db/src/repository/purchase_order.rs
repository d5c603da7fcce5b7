//! # Purchase Order Repository
//!
//! Orders are created `ordered` and move to `received` exactly once.
//!
//! ## Guarded Status Transition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE purchase_orders                                                 │
//! │  SET status = 'received', received_at = now, updated_at = now           │
//! │  WHERE id = ? AND status = 'ordered'                                    │
//! │                                                                         │
//! │  rows_affected = 1 → this caller owns the transition                    │
//! │  rows_affected = 0 → missing, or already received by someone else      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Two concurrent receivers cannot both see `rows_affected = 1`, so stock is
//! incremented once per order.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use tally_core::{PurchaseOrder, PurchaseOrderItem, PurchaseOrderStatus, PurchaseOrderSummary};

/// One line of a new purchase order.
#[derive(Debug, Clone)]
pub struct NewPurchaseOrderItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

pub struct PurchaseOrderRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PurchaseOrderRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        PurchaseOrderRepository { conn }
    }

    /// Inserts an order header in status `ordered`.
    pub async fn insert_order(
        &mut self,
        shop_id: Option<&str>,
        supplier_id: Option<&str>,
        total_amount_cents: i64,
    ) -> DbResult<PurchaseOrder> {
        let now = Utc::now();
        let order = PurchaseOrder {
            id: new_id(),
            shop_id: shop_id.map(str::to_string),
            supplier_id: supplier_id.map(str::to_string),
            status: PurchaseOrderStatus::Ordered,
            total_amount_cents,
            created_at: now,
            updated_at: now,
            received_at: None,
        };

        debug!(id = %order.id, total_amount_cents, "Inserting purchase order");

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, shop_id, supplier_id, status, total_amount_cents,
                created_at, updated_at, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)
            "#,
        )
        .bind(&order.id)
        .bind(&order.shop_id)
        .bind(&order.supplier_id)
        .bind(order.status)
        .bind(order.total_amount_cents)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(order)
    }

    pub async fn insert_item(
        &mut self,
        order_id: &str,
        new: &NewPurchaseOrderItem,
    ) -> DbResult<PurchaseOrderItem> {
        let item = PurchaseOrderItem {
            id: new_id(),
            purchase_order_id: order_id.to_string(),
            product_id: new.product_id.clone(),
            quantity: new.quantity,
            unit_price_cents: new.unit_price_cents,
            total_price_cents: new.quantity * new.unit_price_cents,
        };

        sqlx::query(
            r#"
            INSERT INTO purchase_order_items (
                id, purchase_order_id, product_id, quantity, unit_price_cents, total_price_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.purchase_order_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_price_cents)
        .execute(&mut *self.conn)
        .await?;

        Ok(item)
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let order =
            sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;

        Ok(order)
    }

    /// Lines of one order, in insertion order.
    pub async fn items_for_order(&mut self, order_id: &str) -> DbResult<Vec<PurchaseOrderItem>> {
        let items = sqlx::query_as::<_, PurchaseOrderItem>(
            "SELECT * FROM purchase_order_items WHERE purchase_order_id = ?1 ORDER BY rowid",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }

    /// All orders with supplier names, newest first.
    pub async fn list_with_supplier(&mut self) -> DbResult<Vec<PurchaseOrderSummary>> {
        let orders = sqlx::query_as::<_, PurchaseOrderSummary>(
            r#"
            SELECT po.*, s.name AS supplier_name
            FROM purchase_orders po
            LEFT JOIN suppliers s ON s.id = po.supplier_id
            ORDER BY po.created_at DESC, po.rowid DESC
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(orders)
    }

    /// Moves an order from `ordered` to `received`.
    ///
    /// ## Returns
    /// `true` if this call performed the transition, `false` if the order is
    /// missing or was not in `ordered`.
    pub async fn mark_received(&mut self, id: &str) -> DbResult<bool> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE purchase_orders
            SET status = 'received', received_at = ?2, updated_at = ?2
            WHERE id = ?1 AND status = 'ordered'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        debug!(id = %id, transitioned = result.rows_affected() == 1, "Marking purchase order received");

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::{NewProduct, ProductRepository};
    use crate::repository::supplier::{NewSupplier, SupplierRepository};
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_order_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let supplier = SupplierRepository::new(&mut conn)
            .insert(&NewSupplier {
                name: "Tema Pharma".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let product = ProductRepository::new(&mut conn)
            .insert(&NewProduct {
                shop_id: None,
                category_id: None,
                name: "Amoxicillin 500mg".to_string(),
                sku: "AMX-500".to_string(),
                price_cents: 2500,
                cost_cents: 1500,
                stock_quantity: 5,
                low_stock_threshold: 10,
            })
            .await
            .unwrap();

        let mut repo = PurchaseOrderRepository::new(&mut conn);
        let order = repo.insert_order(None, Some(supplier.id.as_str()), 15_000).await.unwrap();
        let item = repo
            .insert_item(
                &order.id,
                &NewPurchaseOrderItem {
                    product_id: product.id.clone(),
                    quantity: 10,
                    unit_price_cents: 1500,
                },
            )
            .await
            .unwrap();
        assert_eq!(item.total_price_cents, 15_000);
        assert_eq!(repo.items_for_order(&order.id).await.unwrap().len(), 1);

        let listed = repo.list_with_supplier().await.unwrap();
        assert_eq!(listed[0].supplier_name.as_deref(), Some("Tema Pharma"));
        assert_eq!(listed[0].order.status, PurchaseOrderStatus::Ordered);

        assert!(repo.mark_received(&order.id).await.unwrap());
        assert!(!repo.mark_received(&order.id).await.unwrap());
        assert!(!repo.mark_received("missing").await.unwrap());

        let received = repo.get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(received.status, PurchaseOrderStatus::Received);
        assert!(received.received_at.is_some());
    }
}
