//! # Product Repository
//!
//! Catalog rows and the atomic stock adjust.
//!
//! ## Stock Is Only Ever Adjusted, Never Written
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                            │
//! │                                                                     │
//! │  ❌ WRONG: read, compute, write back (lost updates)                 │
//! │     SELECT stock_quantity ... → 5                                   │
//! │     UPDATE products SET stock_quantity = 5 - 2                      │
//! │                                                                     │
//! │  ✅ CORRECT: one guarded statement                                  │
//! │     UPDATE products                                                 │
//! │        SET stock_quantity = stock_quantity + :delta                 │
//! │      WHERE id = :id AND stock_quantity + :delta >= 0                │
//! │  RETURNING stock_quantity                                           │
//! │                                                                     │
//! │  Checkout A: −3 ┐                                                   │
//! │  Checkout B: −2 ┼─► both applied, or one refused with               │
//! │  Receiving: +10 ┘   InsufficientStock. Never a lost update.         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `update` cannot touch `stock_quantity`; `adjust_stock` is the only writer.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};
use tally_core::{CatalogEntry, Product};

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub shop_id: Option<String>,
    pub category_id: Option<String>,
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub stock_quantity: i64,
    pub low_stock_threshold: i64,
}

/// Editable catalog fields. Stock is deliberately absent.
#[derive(Debug, Clone)]
pub struct ProductUpdate {
    pub category_id: Option<String>,
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub low_stock_threshold: i64,
}

/// Repository for product rows.
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(product)
    }

    pub async fn get_by_sku(&mut self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(product)
    }

    /// Lists the catalog with category names, ordered by product name.
    pub async fn list_with_category(&mut self) -> DbResult<Vec<CatalogEntry>> {
        let entries = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT p.*, c.name AS category_name
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id
            ORDER BY p.name COLLATE NOCASE ASC
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(entries)
    }

    /// All products (for inventory valuation).
    pub async fn list_all(&mut self) -> DbResult<Vec<Product>> {
        let products =
            sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY name COLLATE NOCASE")
                .fetch_all(&mut *self.conn)
                .await?;

        Ok(products)
    }

    /// Products at or below their low-stock threshold, emptiest first.
    pub async fn list_low_stock(&mut self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE stock_quantity <= low_stock_threshold
            ORDER BY stock_quantity ASC, name COLLATE NOCASE ASC
            "#,
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(products)
    }

    pub async fn insert(&mut self, new: &NewProduct) -> DbResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: new_id(),
            shop_id: new.shop_id.clone(),
            category_id: new.category_id.clone(),
            name: new.name.clone(),
            sku: new.sku.clone(),
            price_cents: new.price_cents,
            cost_cents: new.cost_cents,
            stock_quantity: new.stock_quantity,
            low_stock_threshold: new.low_stock_threshold,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, shop_id, category_id, name, sku,
                price_cents, cost_cents, stock_quantity, low_stock_threshold,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.shop_id)
        .bind(&product.category_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.stock_quantity)
        .bind(product.low_stock_threshold)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.sku.clone(),
            },
            other => other,
        })?;

        Ok(product)
    }

    /// Updates catalog fields and returns the updated row.
    pub async fn update(&mut self, id: &str, patch: &ProductUpdate) -> DbResult<Product> {
        debug!(id = %id, "Updating product");

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                category_id = ?2,
                name = ?3,
                sku = ?4,
                price_cents = ?5,
                cost_cents = ?6,
                low_stock_threshold = ?7,
                updated_at = ?8
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&patch.category_id)
        .bind(&patch.name)
        .bind(&patch.sku)
        .bind(patch.price_cents)
        .bind(patch.cost_cents)
        .bind(patch.low_stock_threshold)
        .bind(Utc::now())
        .fetch_optional(&mut *self.conn)
        .await?;

        updated.ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes a product. Fails with `ForeignKeyViolation` while sales or
    /// purchase orders still reference it.
    pub async fn delete(&mut self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Atomically adds `delta` to a product's stock and returns the new quantity.
    ///
    /// ## Arguments
    /// * `id` - Product ID
    /// * `delta` - Negative for sales, positive for receiving
    ///
    /// ## Errors
    /// * `InsufficientStock` - the result would be negative; nothing changed
    /// * `NotFound` - no such product
    pub async fn adjust_stock(&mut self, id: &str, delta: i64) -> DbResult<i64> {
        debug!(product_id = %id, delta, "Adjusting stock");

        let new_quantity: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + ?2,
                updated_at = ?3
            WHERE id = ?1 AND stock_quantity + ?2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(id)
        .bind(delta)
        .bind(Utc::now())
        .fetch_optional(&mut *self.conn)
        .await?;

        if let Some(quantity) = new_quantity {
            return Ok(quantity);
        }

        let available: Option<i64> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;

        match available {
            Some(available) => Err(DbError::InsufficientStock {
                product_id: id.to_string(),
                available,
                requested: -delta,
            }),
            None => Err(DbError::not_found("Product", id)),
        }
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn new_product(sku: &str, stock: i64) -> NewProduct {
        NewProduct {
            shop_id: None,
            category_id: None,
            name: format!("Product {sku}"),
            sku: sku.to_string(),
            price_cents: 1200,
            cost_cents: 600,
            stock_quantity: stock,
            low_stock_threshold: 10,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);

        let product = repo.insert(&new_product("PAN-ADV", 45)).await.unwrap();

        let fetched = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(fetched.sku, "PAN-ADV");
        assert_eq!(fetched.stock_quantity, 45);
        assert!(repo.get_by_sku("PAN-ADV").await.unwrap().is_some());
        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);

        repo.insert(&new_product("AMX-500", 5)).await.unwrap();
        let err = repo.insert(&new_product("AMX-500", 5)).await.unwrap_err();

        match err {
            DbError::UniqueViolation { value, .. } => assert_eq!(value, "AMX-500"),
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_adjust_stock_applies_delta() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);
        let product = repo.insert(&new_product("VIT-C", 5)).await.unwrap();

        assert_eq!(repo.adjust_stock(&product.id, 10).await.unwrap(), 15);
        assert_eq!(repo.adjust_stock(&product.id, -15).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_adjust_stock_refuses_negative() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);
        let product = repo.insert(&new_product("HS-100", 3)).await.unwrap();

        let err = repo.adjust_stock(&product.id, -5).await.unwrap_err();
        match err {
            DbError::InsufficientStock {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, product.id);
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Unchanged.
        let after = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, 3);
    }

    #[tokio::test]
    async fn test_adjust_stock_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let err = ProductRepository::new(&mut conn)
            .adjust_stock("nope", -1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_never_touches_stock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);
        let product = repo.insert(&new_product("ZFL-01", 7)).await.unwrap();

        let updated = repo
            .update(
                &product.id,
                &ProductUpdate {
                    category_id: None,
                    name: "Zinc Fluoride".to_string(),
                    sku: "ZFL-01".to_string(),
                    price_cents: 1850,
                    cost_cents: 1000,
                    low_stock_threshold: 2,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Zinc Fluoride");
        assert_eq!(updated.price_cents, 1850);
        assert_eq!(updated.stock_quantity, 7);
    }

    #[tokio::test]
    async fn test_low_stock_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);
        repo.insert(&new_product("LOW", 10)).await.unwrap();
        repo.insert(&new_product("EMPTY", 0)).await.unwrap();
        repo.insert(&new_product("PLENTY", 11)).await.unwrap();

        let low = repo.list_low_stock().await.unwrap();
        let skus: Vec<&str> = low.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["EMPTY", "LOW"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);
        let product = repo.insert(&new_product("DEL-1", 1)).await.unwrap();

        repo.delete(&product.id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(matches!(
            repo.delete(&product.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
