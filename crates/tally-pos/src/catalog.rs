//! # Catalog Service
//!
//! Products and categories, plus bulk import.
//!
//! Stock is never edited here. It changes only through checkout (down) and
//! purchase receiving (up), both via the atomic adjust.
//!
//! ## Bulk Import
//! ```text
//! rows ──► ensure a shop exists (first shop, else "Imported Shop")
//!   │
//!   └─► per row, own transaction:
//!         validate ─► find-or-create category ─► INSERT product
//!           │                                       │
//!           ✗ → Failed { row_index, error }         ✓ → Imported { product }
//!
//! A bad row never aborts the batch.
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use ts_rs::TS;

use tally_core::analytics::UNCATEGORIZED;
use tally_core::validation::{
    validate_id, validate_name, validate_sku, validate_stock_level, validate_unit_cents,
    ValidationResult,
};
use tally_core::{CatalogEntry, Category, Money, Product, RequestContext};
use tally_db::{
    CategoryRepository, Database, DbError, NewProduct, ProductRepository, ProductUpdate,
    ShopDetails, ShopRepository,
};

use crate::attribution::AttributionResolver;
use crate::error::PosResult;
use crate::retry::{with_retry, RetryPolicy};

/// Name given to the shop created when importing into an empty store.
pub const IMPORT_SHOP_NAME: &str = "Imported Shop";

const MAX_NAME_LEN: usize = 200;
const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 10;

fn default_threshold() -> i64 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

// =============================================================================
// Inputs
// =============================================================================

/// A product to create, by form or by import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub name: String,
    pub sku: String,
    pub price: Money,
    #[serde(default)]
    pub cost: Money,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_threshold")]
    pub low_stock_threshold: i64,
    /// Category name; created on first use.
    #[serde(default)]
    pub category: Option<String>,
}

/// Editable catalog fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductChanges {
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub cost: Money,
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub category: Option<String>,
}

/// Result of one import row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported { product: Product },
    Failed { row_index: usize, error: String },
}

impl ImportOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, ImportOutcome::Imported { .. })
    }
}

struct ValidProduct {
    name: String,
    sku: String,
    category: Option<String>,
}

fn validate_product(
    name: &str,
    sku: &str,
    price: Money,
    cost: Money,
    threshold: i64,
    category: Option<&str>,
) -> ValidationResult<ValidProduct> {
    let name = validate_name("name", name, MAX_NAME_LEN)?;
    validate_sku(sku)?;
    validate_unit_cents("price", price.cents())?;
    validate_unit_cents("cost", cost.cents())?;
    validate_stock_level("low_stock_threshold", threshold)?;

    let category = match category.map(str::trim) {
        None | Some("") => None,
        Some(c) => Some(validate_name("category", c, MAX_NAME_LEN)?),
    };

    Ok(ValidProduct {
        name,
        sku: sku.trim().to_string(),
        category,
    })
}

// =============================================================================
// Service
// =============================================================================

pub struct CatalogService {
    db: Arc<Database>,
    attribution: AttributionResolver,
    retry: RetryPolicy,
}

impl CatalogService {
    pub fn new(db: Arc<Database>, attribution: AttributionResolver, retry: RetryPolicy) -> Self {
        CatalogService {
            db,
            attribution,
            retry,
        }
    }

    /// The catalog with category names, ordered by product name.
    pub async fn list_products(&self) -> PosResult<Vec<CatalogEntry>> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(ProductRepository::new(&mut conn).list_with_category().await?)
        })
        .await
    }

    pub async fn list_categories(&self) -> PosResult<Vec<Category>> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(CategoryRepository::new(&mut conn).list().await?)
        })
        .await
    }

    pub async fn find_or_create_category(&self, name: &str) -> PosResult<Category> {
        let name = validate_name("category", name, MAX_NAME_LEN)?;
        let mut conn = self.db.acquire().await?;
        Ok(CategoryRepository::new(&mut conn).find_or_create(&name).await?)
    }

    /// Creates a product in the caller's shop.
    ///
    /// ## Errors
    /// * `Validation` - blank name, malformed SKU, negative price, cost or stock
    /// * `Persistence` - duplicate SKU
    #[instrument(skip(self, ctx, input), fields(sku = %input.sku))]
    pub async fn create_product(&self, ctx: &RequestContext, input: ProductInput) -> PosResult<Product> {
        let valid = validate_product(
            &input.name,
            &input.sku,
            input.price,
            input.cost,
            input.low_stock_threshold,
            input.category.as_deref(),
        )?;
        validate_stock_level("stock_quantity", input.stock_quantity)?;

        let attribution = {
            let mut conn = self.db.acquire().await?;
            self.attribution.resolve(&mut conn, ctx).await
        };

        let mut tx = self.db.begin().await?;
        let category_id = match valid.category.as_deref() {
            Some(name) => Some(CategoryRepository::new(&mut tx).find_or_create(name).await?.id),
            None => None,
        };

        let product = ProductRepository::new(&mut tx)
            .insert(&NewProduct {
                shop_id: attribution.shop_id,
                category_id,
                name: valid.name,
                sku: valid.sku,
                price_cents: input.price.cents(),
                cost_cents: input.cost.cents(),
                stock_quantity: input.stock_quantity,
                low_stock_threshold: input.low_stock_threshold,
            })
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    /// Updates name, SKU, prices, threshold and category. Stock is untouched.
    #[instrument(skip(self, changes))]
    pub async fn update_product(&self, id: &str, changes: ProductChanges) -> PosResult<Product> {
        validate_id("product_id", id)?;
        let valid = validate_product(
            &changes.name,
            &changes.sku,
            changes.price,
            changes.cost,
            changes.low_stock_threshold,
            changes.category.as_deref(),
        )?;

        let mut tx = self.db.begin().await?;
        let category_id = match valid.category.as_deref() {
            Some(name) => Some(CategoryRepository::new(&mut tx).find_or_create(name).await?.id),
            None => None,
        };

        let product = ProductRepository::new(&mut tx)
            .update(
                id,
                &ProductUpdate {
                    category_id,
                    name: valid.name,
                    sku: valid.sku,
                    price_cents: changes.price.cents(),
                    cost_cents: changes.cost.cents(),
                    low_stock_threshold: changes.low_stock_threshold,
                },
            )
            .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(product_id = %product.id, "Product updated");
        Ok(product)
    }

    /// Deletes a product that no sale or purchase order references.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: &str) -> PosResult<()> {
        validate_id("product_id", id)?;
        let mut conn = self.db.acquire().await?;
        ProductRepository::new(&mut conn).delete(id).await?;
        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Imports products row by row. Never fails as a whole once a shop is
    /// available; bad rows are reported in place.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn import_products(&self, rows: Vec<ProductInput>) -> PosResult<Vec<ImportOutcome>> {
        let shop_id = self.ensure_import_shop().await?;

        let mut outcomes = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.into_iter().enumerate() {
            match self.import_row(&shop_id, row).await {
                Ok(product) => outcomes.push(ImportOutcome::Imported { product }),
                Err(e) => {
                    warn!(row_index, error = %e, "Import row rejected");
                    outcomes.push(ImportOutcome::Failed {
                        row_index,
                        error: e.to_string(),
                    });
                }
            }
        }

        let imported = outcomes.iter().filter(|o| o.is_imported()).count();
        info!(imported, failed = outcomes.len() - imported, "Import finished");
        Ok(outcomes)
    }

    async fn ensure_import_shop(&self) -> PosResult<String> {
        let mut conn = self.db.acquire().await?;
        if let Some(shop) = ShopRepository::new(&mut conn).first().await? {
            return Ok(shop.id);
        }

        let shop = ShopRepository::new(&mut conn)
            .insert(&ShopDetails {
                name: IMPORT_SHOP_NAME.to_string(),
                address: None,
                phone: None,
                currency: crate::settings::DEFAULT_CURRENCY.to_string(),
            })
            .await?;
        info!(shop_id = %shop.id, "Created shop for import");
        Ok(shop.id)
    }

    async fn import_row(&self, shop_id: &str, row: ProductInput) -> PosResult<Product> {
        let valid = validate_product(
            &row.name,
            &row.sku,
            row.price,
            row.cost,
            row.low_stock_threshold,
            row.category.as_deref(),
        )?;
        validate_stock_level("stock_quantity", row.stock_quantity)?;
        let category = valid.category.unwrap_or_else(|| UNCATEGORIZED.to_string());

        let mut tx = self.db.begin().await?;
        let category = CategoryRepository::new(&mut tx).find_or_create(&category).await?;
        let product = ProductRepository::new(&mut tx)
            .insert(&NewProduct {
                shop_id: Some(shop_id.to_string()),
                category_id: Some(category.id),
                name: valid.name,
                sku: valid.sku,
                price_cents: row.price.cents(),
                cost_cents: row.cost.cents(),
                stock_quantity: row.stock_quantity,
                low_stock_threshold: row.low_stock_threshold,
            })
            .await?;
        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(product)
    }
}
