//! # Sale Repository
//!
//! Sales and sale items. Both are append-only: there is no update or delete.
//!
//! ## Checkout Write Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   ONE TRANSACTION (tally-pos checkout)                  │
//! │                                                                         │
//! │  1. insert_sale()      → sales row, status 'completed'                  │
//! │  2. insert_item() × N  → sale_items rows (price/cost snapshots)         │
//! │  3. adjust_stock() × N → products (ProductRepository)                   │
//! │  4. enqueue()          → outbox loyalty entry (OutboxRepository)        │
//! │                                                                         │
//! │  COMMIT ← all four or none                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use tally_core::analytics::{LineFact, SaleFact};
use tally_core::{PaymentMethod, Sale, SaleItem, SaleStatus};

/// Fields for a new sale. Totals are computed by the caller.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub shop_id: Option<String>,
    pub staff_id: Option<String>,
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
}

/// Fields for a new sale item.
#[derive(Debug, Clone)]
pub struct NewSaleItem {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
}

pub struct SaleRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SaleRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SaleRepository { conn }
    }

    /// Inserts a completed sale.
    pub async fn insert_sale(&mut self, new: &NewSale) -> DbResult<Sale> {
        let sale = Sale {
            id: new_id(),
            shop_id: new.shop_id.clone(),
            staff_id: new.staff_id.clone(),
            customer_id: new.customer_id.clone(),
            subtotal_cents: new.subtotal_cents,
            discount_cents: new.discount_cents,
            tax_cents: new.tax_cents,
            total_cents: new.total_cents,
            payment_method: new.payment_method,
            status: SaleStatus::Completed,
            created_at: Utc::now(),
        };

        debug!(id = %sale.id, total_cents = sale.total_cents, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, shop_id, staff_id, customer_id,
                subtotal_cents, discount_cents, tax_cents, total_cents,
                payment_method, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.shop_id)
        .bind(&sale.staff_id)
        .bind(&sale.customer_id)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.tax_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.status)
        .bind(sale.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(sale)
    }

    /// Inserts one line of a sale. `total_price_cents` is derived here.
    pub async fn insert_item(&mut self, sale_id: &str, new: &NewSaleItem) -> DbResult<SaleItem> {
        let item = SaleItem {
            id: new_id(),
            sale_id: sale_id.to_string(),
            product_id: new.product_id.clone(),
            quantity: new.quantity,
            unit_price_cents: new.unit_price_cents,
            unit_cost_cents: new.unit_cost_cents,
            total_price_cents: new.quantity * new.unit_price_cents,
            created_at: Utc::now(),
        };

        debug!(sale_id = %sale_id, product_id = %item.product_id, quantity = item.quantity, "Inserting sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, quantity,
                unit_price_cents, unit_cost_cents, total_price_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.unit_cost_cents)
        .bind(item.total_price_cents)
        .bind(item.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(item)
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(sale)
    }

    /// Items of one sale, in insertion order.
    pub async fn items_for_sale(&mut self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY rowid",
        )
        .bind(sale_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }

    /// Completed sales, newest first, optionally since a point in time.
    pub async fn list_completed(&mut self, since: Option<DateTime<Utc>>) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE status = 'completed'
              AND (?1 IS NULL OR created_at >= ?1)
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(since)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(sales)
    }

    /// Items of completed sales (for COGS).
    pub async fn list_items(&mut self, since: Option<DateTime<Utc>>) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT si.* FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            WHERE s.status = 'completed'
              AND (?1 IS NULL OR s.created_at >= ?1)
            ORDER BY si.rowid
            "#,
        )
        .bind(since)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }

    /// Sales joined with customer names (advanced analytics).
    pub async fn sale_facts(&mut self, since: Option<DateTime<Utc>>) -> DbResult<Vec<SaleFact>> {
        let facts = sqlx::query_as::<_, SaleFact>(
            r#"
            SELECT s.id AS sale_id, s.customer_id, c.full_name AS customer_name,
                   s.total_cents, s.created_at
            FROM sales s
            LEFT JOIN customers c ON c.id = s.customer_id
            WHERE s.status = 'completed'
              AND (?1 IS NULL OR s.created_at >= ?1)
            "#,
        )
        .bind(since)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(facts)
    }

    /// Sale items joined with product and category names (advanced analytics).
    pub async fn line_facts(&mut self, since: Option<DateTime<Utc>>) -> DbResult<Vec<LineFact>> {
        let facts = sqlx::query_as::<_, LineFact>(
            r#"
            SELECT si.product_id, p.name AS product_name, c.name AS category_name,
                   si.quantity, si.total_price_cents
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            LEFT JOIN products p ON p.id = si.product_id
            LEFT JOIN categories c ON c.id = p.category_id
            WHERE s.status = 'completed'
              AND (?1 IS NULL OR s.created_at >= ?1)
            "#,
        )
        .bind(since)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(facts)
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }

    pub async fn count_items(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_items")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::{NewProduct, ProductRepository};
    use crate::{Database, DbConfig, DbError};

    async fn seed_product(conn: &mut SqliteConnection) -> String {
        ProductRepository::new(conn)
            .insert(&NewProduct {
                shop_id: None,
                category_id: None,
                name: "Paracetamol Advance".to_string(),
                sku: "PAN-ADV".to_string(),
                price_cents: 1200,
                cost_cents: 600,
                stock_quantity: 45,
                low_stock_threshold: 10,
            })
            .await
            .unwrap()
            .id
    }

    fn new_sale(total: i64) -> NewSale {
        NewSale {
            shop_id: None,
            staff_id: None,
            customer_id: None,
            subtotal_cents: total,
            discount_cents: 0,
            tax_cents: 0,
            total_cents: total,
            payment_method: PaymentMethod::MobileMoney,
        }
    }

    #[tokio::test]
    async fn test_insert_sale_with_items() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let product_id = seed_product(&mut conn).await;
        let mut repo = SaleRepository::new(&mut conn);

        let sale = repo.insert_sale(&new_sale(2400)).await.unwrap();
        let item = repo
            .insert_item(
                &sale.id,
                &NewSaleItem {
                    product_id: product_id.clone(),
                    quantity: 2,
                    unit_price_cents: 1200,
                    unit_cost_cents: 600,
                },
            )
            .await
            .unwrap();
        assert_eq!(item.total_price_cents, 2400);

        let fetched = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(fetched.payment_method, PaymentMethod::MobileMoney);
        assert_eq!(fetched.status, SaleStatus::Completed);
        assert!(fetched.reconciles());

        let items = repo.items_for_sale(&sale.id).await.unwrap();
        assert_eq!(items, vec![item]);

        let facts = repo.line_facts(None).await.unwrap();
        assert_eq!(facts[0].product_name.as_deref(), Some("Paracetamol Advance"));
        assert_eq!(facts[0].category_name, None);
    }

    #[tokio::test]
    async fn test_unbalanced_sale_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut bad = new_sale(1000);
        bad.total_cents = 999;

        let err = SaleRepository::new(&mut conn).insert_sale(&bad).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_since_filter() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SaleRepository::new(&mut conn);
        repo.insert_sale(&new_sale(100)).await.unwrap();

        assert_eq!(repo.list_completed(None).await.unwrap().len(), 1);
        let future = Utc::now() + chrono::Duration::days(1);
        assert!(repo.list_completed(Some(future)).await.unwrap().is_empty());
        assert!(repo.sale_facts(Some(future)).await.unwrap().is_empty());
    }
}
