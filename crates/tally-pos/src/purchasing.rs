//! # Purchasing Service
//!
//! Suppliers, purchase orders and the stock audits that receiving leaves
//! behind. Receiving itself lives in [`crate::receiving`].
//!
//! ```text
//! create_supplier ──► create_purchase_order (status 'ordered')
//!                              │
//!                              ▼
//!                 ReceivingService::receive_purchase_order
//!                              │
//!                              ▼
//!              get_stock_audit / list_stock_audits
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use ts_rs::TS;

use tally_core::validation::{
    validate_email, validate_id, validate_line_count, validate_name, validate_optional_text,
    validate_quantity, validate_unit_cents,
};
use tally_core::{
    Money, PurchaseOrder, PurchaseOrderItem, PurchaseOrderSummary, RequestContext, StockAudit,
    Supplier,
};
use tally_db::{
    Database, DbError, NewPurchaseOrderItem, NewSupplier, ProductRepository,
    PurchaseOrderRepository, StockAuditRepository, SupplierRepository,
};

use crate::attribution::AttributionResolver;
use crate::error::{PosError, PosResult};
use crate::receiving::StockAuditDetail;
use crate::retry::{with_retry, RetryPolicy};

const MAX_NAME_LEN: usize = 200;

// =============================================================================
// Inputs / Outputs
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SupplierInput {
    pub name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderRequest {
    #[serde(default)]
    pub supplier_id: Option<String>,
    pub items: Vec<PurchaseOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PurchaseOrderDetail {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

// =============================================================================
// Service
// =============================================================================

pub struct PurchasingService {
    db: Arc<Database>,
    attribution: AttributionResolver,
    retry: RetryPolicy,
}

impl PurchasingService {
    pub fn new(db: Arc<Database>, attribution: AttributionResolver, retry: RetryPolicy) -> Self {
        PurchasingService {
            db,
            attribution,
            retry,
        }
    }

    // -------------------------------------------------------------------------
    // Suppliers
    // -------------------------------------------------------------------------

    pub async fn list_suppliers(&self) -> PosResult<Vec<Supplier>> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(SupplierRepository::new(&mut conn).list().await?)
        })
        .await
    }

    #[instrument(skip(self, ctx, input))]
    pub async fn create_supplier(&self, ctx: &RequestContext, input: SupplierInput) -> PosResult<Supplier> {
        let name = validate_name("name", &input.name, MAX_NAME_LEN)?;
        let contact_name =
            validate_optional_text("contact_name", input.contact_name.as_deref(), MAX_NAME_LEN)?;
        let phone = validate_optional_text("phone", input.phone.as_deref(), 30)?;
        let email = validate_email(input.email.as_deref())?;

        let mut conn = self.db.acquire().await?;
        let attribution = self.attribution.resolve(&mut conn, ctx).await;
        let supplier = SupplierRepository::new(&mut conn)
            .insert(&NewSupplier {
                shop_id: attribution.shop_id,
                name,
                contact_name,
                phone,
                email,
            })
            .await?;

        info!(supplier_id = %supplier.id, "Supplier created");
        Ok(supplier)
    }

    // -------------------------------------------------------------------------
    // Purchase orders
    // -------------------------------------------------------------------------

    /// Creates an order in `ordered` status with all of its lines.
    ///
    /// ## Returns
    /// The order and its lines. Each line total is quantity × unit price and
    /// the order total is their sum.
    ///
    /// ## Errors
    /// * `Validation` - no lines, non-positive quantity, negative price
    /// * `NotFound` - unknown supplier or product
    #[instrument(skip(self, ctx, request), fields(lines = request.items.len()))]
    pub async fn create_purchase_order(
        &self,
        ctx: &RequestContext,
        request: PurchaseOrderRequest,
    ) -> PosResult<PurchaseOrderDetail> {
        validate_line_count("items", request.items.len())?;
        for line in &request.items {
            validate_id("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
            validate_unit_cents("unit_price", line.unit_price.cents())?;
        }
        if let Some(supplier_id) = request.supplier_id.as_deref() {
            validate_id("supplier_id", supplier_id)?;
        }

        let total: Money = request
            .items
            .iter()
            .map(|line| line.unit_price.multiply_quantity(line.quantity))
            .sum();

        let attribution = {
            let mut conn = self.db.acquire().await?;

            if let Some(supplier_id) = request.supplier_id.as_deref() {
                SupplierRepository::new(&mut conn)
                    .get_by_id(supplier_id)
                    .await?
                    .ok_or_else(|| PosError::not_found("Supplier", supplier_id))?;
            }
            for line in &request.items {
                ProductRepository::new(&mut conn)
                    .get_by_id(&line.product_id)
                    .await?
                    .ok_or_else(|| PosError::not_found("Product", line.product_id.as_str()))?;
            }

            self.attribution.resolve(&mut conn, ctx).await
        };

        let mut tx = self.db.begin().await?;

        let order = PurchaseOrderRepository::new(&mut tx)
            .insert_order(
                attribution.shop_id.as_deref(),
                request.supplier_id.as_deref(),
                total.cents(),
            )
            .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let item = PurchaseOrderRepository::new(&mut tx)
                .insert_item(
                    &order.id,
                    &NewPurchaseOrderItem {
                        product_id: line.product_id.clone(),
                        quantity: line.quantity,
                        unit_price_cents: line.unit_price.cents(),
                    },
                )
                .await?;
            items.push(item);
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(order_id = %order.id, total = %total, "Purchase order created");
        Ok(PurchaseOrderDetail { order, items })
    }

    /// All orders with supplier names, newest first.
    pub async fn list_purchase_orders(&self) -> PosResult<Vec<PurchaseOrderSummary>> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(PurchaseOrderRepository::new(&mut conn)
                .list_with_supplier()
                .await?)
        })
        .await
    }

    pub async fn get_purchase_order(&self, id: &str) -> PosResult<PurchaseOrderDetail> {
        validate_id("order_id", id)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = PurchaseOrderRepository::new(&mut conn);

        let order = repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| PosError::not_found("PurchaseOrder", id))?;
        let items = repo.items_for_order(id).await?;

        Ok(PurchaseOrderDetail { order, items })
    }

    // -------------------------------------------------------------------------
    // Stock audits
    // -------------------------------------------------------------------------

    pub async fn get_stock_audit(&self, id: &str) -> PosResult<StockAuditDetail> {
        validate_id("audit_id", id)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = StockAuditRepository::new(&mut conn);

        let audit = repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| PosError::not_found("StockAudit", id))?;
        let items = repo.items_for_audit(id).await?;

        Ok(StockAuditDetail { audit, items })
    }

    /// The audit left by receiving an order, if it has been received.
    pub async fn audit_for_purchase_order(&self, order_id: &str) -> PosResult<Option<StockAuditDetail>> {
        validate_id("order_id", order_id)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = StockAuditRepository::new(&mut conn);

        let Some(audit) = repo.find_by_purchase_order(order_id).await? else {
            return Ok(None);
        };
        let items = repo.items_for_audit(&audit.id).await?;

        Ok(Some(StockAuditDetail { audit, items }))
    }

    /// Audits newest first, optionally for one shop.
    pub async fn list_stock_audits(&self, shop_id: Option<&str>) -> PosResult<Vec<StockAudit>> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(StockAuditRepository::new(&mut conn).list(shop_id).await?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use tally_core::PurchaseOrderStatus;

    fn service(fx: &Fixture) -> PurchasingService {
        PurchasingService::new(fx.db.clone(), AttributionResolver::new(true), RetryPolicy::default())
    }

    fn po_line(product_id: &str, quantity: i64, unit_price_cents: i64) -> PurchaseOrderLine {
        PurchaseOrderLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price: Money::from_cents(unit_price_cents),
        }
    }

    #[tokio::test]
    async fn test_supplier_create_and_list() {
        let fx = Fixture::new().await;
        let purchasing = service(&fx);

        let supplier = purchasing
            .create_supplier(
                &fx.ctx(),
                SupplierInput {
                    name: " Tema Pharma ".to_string(),
                    contact_name: Some("Abena".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(supplier.name, "Tema Pharma");

        let blank = purchasing.create_supplier(&fx.ctx(), SupplierInput::default()).await;
        assert!(matches!(blank, Err(PosError::Validation(_))));

        assert_eq!(purchasing.list_suppliers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_totals_and_listing() {
        let fx = Fixture::new().await;
        let purchasing = service(&fx);
        let supplier_id = fx.supplier("Kumasi Wholesale").await;
        let a = fx.product("A-1", 1000, 0).await;
        let b = fx.product("B-1", 1000, 0).await;

        let detail = purchasing
            .create_purchase_order(
                &fx.ctx(),
                PurchaseOrderRequest {
                    supplier_id: Some(supplier_id.clone()),
                    items: vec![po_line(&a.id, 10, 450), po_line(&b.id, 3, 1200)],
                },
            )
            .await
            .unwrap();

        assert_eq!(detail.order.status, PurchaseOrderStatus::Ordered);
        assert_eq!(detail.order.total_amount_cents, 8100);
        assert_eq!(detail.items[0].total_price_cents, 4500);
        assert_eq!(detail.items[1].total_price_cents, 3600);

        let summaries = purchasing.list_purchase_orders().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].supplier_name.as_deref(), Some("Kumasi Wholesale"));

        let fetched = purchasing.get_purchase_order(&detail.order.id).await.unwrap();
        assert_eq!(fetched.order.id, detail.order.id);
        assert_eq!(fetched.items.len(), 2);
        assert_eq!(fetched.items[0].product_id, a.id);
    }

    #[tokio::test]
    async fn test_order_rejects_bad_lines() {
        let fx = Fixture::new().await;
        let purchasing = service(&fx);
        let a = fx.product("A-1", 1000, 0).await;

        let empty = purchasing
            .create_purchase_order(
                &fx.ctx(),
                PurchaseOrderRequest {
                    supplier_id: None,
                    items: vec![],
                },
            )
            .await;
        assert!(matches!(empty, Err(PosError::Validation(_))));

        let zero = purchasing
            .create_purchase_order(
                &fx.ctx(),
                PurchaseOrderRequest {
                    supplier_id: None,
                    items: vec![po_line(&a.id, 0, 100)],
                },
            )
            .await;
        assert!(matches!(zero, Err(PosError::Validation(_))));

        let unknown = purchasing
            .create_purchase_order(
                &fx.ctx(),
                PurchaseOrderRequest {
                    supplier_id: None,
                    items: vec![po_line("missing", 1, 100)],
                },
            )
            .await;
        assert!(matches!(unknown, Err(PosError::NotFound { .. })));

        assert_eq!(fx.count("purchase_orders").await, 0);
    }

    #[tokio::test]
    async fn test_audit_reads_after_receiving() {
        let fx = Fixture::new().await;
        let purchasing = service(&fx);
        let a = fx.product("A-1", 1000, 5).await;

        let detail = purchasing
            .create_purchase_order(
                &fx.ctx(),
                PurchaseOrderRequest {
                    supplier_id: None,
                    items: vec![po_line(&a.id, 10, 450)],
                },
            )
            .await
            .unwrap();

        assert!(purchasing
            .audit_for_purchase_order(&detail.order.id)
            .await
            .unwrap()
            .is_none());

        fx.receiving()
            .receive_purchase_order(&detail.order.id)
            .await
            .unwrap();

        let audits = purchasing.list_stock_audits(Some(fx.shop_id.as_str())).await.unwrap();
        assert_eq!(audits.len(), 1);
        assert!(purchasing.list_stock_audits(Some("other-shop")).await.unwrap().is_empty());

        let audit = purchasing.get_stock_audit(&audits[0].id).await.unwrap();
        assert_eq!(audit.items.len(), 1);
        assert_eq!(audit.items[0].previous_quantity, 5);
        assert_eq!(audit.items[0].new_quantity, 15);

        let by_order = purchasing
            .audit_for_purchase_order(&detail.order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_order, audit);
    }
}
