//! # Checkout Workflow
//!
//! Turns a cart into a completed sale.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       complete_sale()                                   │
//! │                                                                         │
//! │  1. price_cart()             ← ValidationError, no I/O yet              │
//! │  2. customer + products exist? ← NotFound, still nothing written        │
//! │  3. resolve attribution      ← never fails                              │
//! │                                                                         │
//! │  ┌─────────────────── ONE TRANSACTION ───────────────────────────────┐  │
//! │  │  4. INSERT sales                                                  │  │
//! │  │  5. INSERT sale_items × N   (price/cost snapshots)                │  │
//! │  │  6. adjust_stock(-qty) per product ← StockInsufficient → ROLLBACK │  │
//! │  │  7. customer linked? → outbox loyalty_accrual                     │  │
//! │  │  COMMIT                                                           │  │
//! │  └───────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  8. apply loyalty entry now (best effort)                               │
//! │       ✓ → LoyaltyStatus::Applied                                        │
//! │       ✗ → LoyaltyStatus::Deferred, the outbox worker retries            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock is decremented with the store's guarded atomic adjust, never read
//! and written back, so concurrent sales of one product cannot lose updates.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use ts_rs::TS;

use tally_core::context::Attribution;
use tally_core::pricing::{self, CartLine, CartTotals, Discount};
use tally_core::validation::validate_id;
use tally_core::{
    LoyaltyAccrual, Money, PaymentMethod, Rate, RequestContext, Sale, SaleItem,
    OUTBOX_KIND_LOYALTY_ACCRUAL,
};
use tally_db::{
    CustomerRepository, Database, DbError, NewSale, NewSaleItem, OutboxRepository,
    ProductRepository, SaleRepository,
};

use crate::attribution::AttributionResolver;
use crate::config::PosConfig;
use crate::error::{PosError, PosResult};
use crate::loyalty::OutboxProcessor;

// =============================================================================
// Request / Response
// =============================================================================

/// A cart submitted by the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub items: Vec<CartLine>,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub discount: Discount,
    pub payment_method: PaymentMethod,
}

/// What happened to the loyalty accrual of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoyaltyStatus {
    /// Walk-in sale, nothing to accrue.
    NoCustomer,
    /// Points were credited before returning.
    Applied { points: i64 },
    /// The accrual is queued and will be credited by the outbox worker.
    Deferred { points: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutOutcome {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub attribution: Attribution,
    pub loyalty: LoyaltyStatus,
}

// =============================================================================
// Service
// =============================================================================

pub struct CheckoutService {
    db: Arc<Database>,
    tax_rate: Rate,
    loyalty_spend_unit_cents: i64,
    attribution: AttributionResolver,
    loyalty: OutboxProcessor,
}

impl CheckoutService {
    pub fn new(db: Arc<Database>, config: &PosConfig) -> Self {
        CheckoutService {
            tax_rate: config.checkout.tax_rate(),
            loyalty_spend_unit_cents: config.checkout.loyalty_spend_unit_cents,
            attribution: AttributionResolver::new(config.tenancy.fallback_to_first_shop),
            loyalty: OutboxProcessor::new(db.clone(), config.outbox.clone()),
            db,
        }
    }

    /// Prices the cart without touching the store.
    pub fn quote(&self, request: &CheckoutRequest) -> PosResult<CartTotals> {
        Ok(pricing::price_cart(&request.items, &request.discount, self.tax_rate)?)
    }

    /// Records a completed sale.
    ///
    /// ## Arguments
    /// * `ctx` - Who is selling, and optionally for which shop
    /// * `request` - Cart lines, optional customer, discount, payment method
    ///
    /// ## Returns
    /// The persisted sale with its items, how it was attributed, and the
    /// state of the customer's loyalty accrual.
    ///
    /// ## Errors
    /// * `Validation` - empty cart, bad quantity or price, discount above subtotal
    /// * `NotFound` - customer or product does not exist
    /// * `StockInsufficient` - a product would go below zero; nothing is written
    /// * `Persistence` - any other store failure; nothing is written
    #[instrument(skip(self, ctx, request), fields(lines = request.items.len()))]
    pub async fn complete_sale(
        &self,
        ctx: &RequestContext,
        request: CheckoutRequest,
    ) -> PosResult<CheckoutOutcome> {
        let totals = self.quote(&request)?;
        if let Some(customer_id) = request.customer_id.as_deref() {
            validate_id("customer_id", customer_id)?;
        }
        let quantities = pricing::quantities_by_product(&request.items);

        let attribution = {
            let mut conn = self.db.acquire().await?;

            if let Some(customer_id) = request.customer_id.as_deref() {
                CustomerRepository::new(&mut conn)
                    .get_by_id(customer_id)
                    .await?
                    .ok_or_else(|| PosError::not_found("Customer", customer_id))?;
            }

            for (product_id, _) in &quantities {
                ProductRepository::new(&mut conn)
                    .get_by_id(product_id)
                    .await?
                    .ok_or_else(|| PosError::not_found("Product", product_id.as_str()))?;
            }

            self.attribution.resolve(&mut conn, ctx).await
        };

        let mut tx = self.db.begin().await?;

        let sale = SaleRepository::new(&mut tx)
            .insert_sale(&NewSale {
                shop_id: attribution.shop_id.clone(),
                staff_id: attribution.staff_id.clone(),
                customer_id: request.customer_id.clone(),
                subtotal_cents: totals.subtotal.cents(),
                discount_cents: totals.discount.cents(),
                tax_cents: totals.tax.cents(),
                total_cents: totals.total.cents(),
                payment_method: request.payment_method,
            })
            .await?;

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let item = SaleRepository::new(&mut tx)
                .insert_item(
                    &sale.id,
                    &NewSaleItem {
                        product_id: line.product_id.clone(),
                        quantity: line.quantity,
                        unit_price_cents: line.unit_price.cents(),
                        unit_cost_cents: line.unit_cost.cents(),
                    },
                )
                .await?;
            items.push(item);
        }

        for (product_id, quantity) in &quantities {
            let remaining = ProductRepository::new(&mut tx)
                .adjust_stock(product_id, -quantity)
                .await
                .map_err(|e| {
                    if let DbError::InsufficientStock { .. } = e {
                        warn!(product_id = %product_id, quantity, "Sale rejected, insufficient stock");
                    }
                    e
                })?;

            if remaining == 0 {
                warn!(product_id = %product_id, "Product is now out of stock");
            }
        }

        let accrual = match request.customer_id.as_deref() {
            Some(customer_id) => {
                let accrual = LoyaltyAccrual {
                    sale_id: sale.id.clone(),
                    customer_id: customer_id.to_string(),
                    amount_cents: totals.total.cents(),
                    points: pricing::loyalty_points(totals.total, self.loyalty_spend_unit_cents),
                };
                let entry = OutboxRepository::new(&mut tx)
                    .enqueue(OUTBOX_KIND_LOYALTY_ACCRUAL, &sale.id, &accrual)
                    .await?;
                Some((entry.id, accrual.points))
            }
            None => None,
        };

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let loyalty = match accrual {
            None => LoyaltyStatus::NoCustomer,
            Some((entry_id, points)) => match self.loyalty.apply_entry(&entry_id).await {
                Ok(_) => LoyaltyStatus::Applied { points },
                Err(e) => {
                    warn!(
                        sale_id = %sale.id,
                        entry_id = %entry_id,
                        error = %e,
                        "Loyalty accrual deferred to the outbox worker"
                    );
                    LoyaltyStatus::Deferred { points }
                }
            },
        };

        info!(
            sale_id = %sale.id,
            shop_id = ?sale.shop_id,
            total = %Money::from_cents(sale.total_cents),
            items = items.len(),
            "Sale completed"
        );

        Ok(CheckoutOutcome {
            sale,
            items,
            attribution,
            loyalty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use tally_core::context::AttributionSource;
    use tally_core::ValidationError;

    fn line(product_id: &str, quantity: i64, price_cents: i64) -> CartLine {
        CartLine::new(
            product_id,
            quantity,
            Money::from_cents(price_cents),
            Money::from_cents(price_cents / 2),
        )
    }

    fn cart(items: Vec<CartLine>, customer_id: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            customer_id: customer_id.map(str::to_string),
            discount: Discount::None,
            payment_method: PaymentMethod::Cash,
        }
    }

    #[tokio::test]
    async fn test_sale_with_customer_accrues_loyalty() {
        let fx = Fixture::new().await;
        let product = fx.product("PAN-01", 1200, 10).await;

        let outcome = fx
            .checkout()
            .complete_sale(
                &fx.ctx(),
                cart(vec![line(&product.id, 2, 1200)], Some(fx.customer_id.as_str())),
            )
            .await
            .unwrap();

        assert_eq!(outcome.sale.subtotal_cents, 2400);
        assert_eq!(outcome.sale.tax_cents, 120);
        assert_eq!(outcome.sale.total_cents, 2520);
        assert!(outcome.sale.reconciles());
        assert_eq!(outcome.loyalty, LoyaltyStatus::Applied { points: 2 });
        assert_eq!(outcome.attribution.source, AttributionSource::StaffProfile);
        assert_eq!(outcome.sale.shop_id.as_deref(), Some(fx.shop_id.as_str()));

        let customer = fx.customer(&fx.customer_id).await;
        assert_eq!(customer.loyalty_points, 2);
        assert_eq!(customer.total_spent_cents, 2520);
        assert_eq!(fx.stock_of(&product.id).await, 8);
    }

    #[tokio::test]
    async fn test_one_sale_and_one_item_per_line() {
        let fx = Fixture::new().await;
        let a = fx.product("A-1", 500, 20).await;
        let b = fx.product("B-1", 1999, 20).await;

        let mut request = cart(
            vec![line(&a.id, 3, 500), line(&b.id, 1, 1999), line(&a.id, 2, 500)],
            None,
        );
        request.discount = Discount::Flat(Money::from_cents(499));

        let outcome = fx.checkout().complete_sale(&fx.ctx(), request).await.unwrap();

        assert_eq!(outcome.items.len(), 3);
        assert_eq!(fx.count("sales").await, 1);
        assert_eq!(fx.count("sale_items").await, 3);
        assert_eq!(outcome.loyalty, LoyaltyStatus::NoCustomer);

        let sale = &outcome.sale;
        assert_eq!(sale.subtotal_cents, 4499);
        assert_eq!(sale.discount_cents, 499);
        assert_eq!(sale.tax_cents, 200);
        assert_eq!(sale.total_cents, 4200);
        let line_sum: i64 = outcome.items.iter().map(|i| i.total_price_cents).sum();
        assert_eq!(line_sum, sale.subtotal_cents);

        assert_eq!(fx.stock_of(&a.id).await, 15);
        assert_eq!(fx.stock_of(&b.id).await, 19);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let fx = Fixture::new().await;
        let plenty = fx.product("OK-1", 100, 50).await;
        let scarce = fx.product("LOW-1", 100, 1).await;

        let err = fx
            .checkout()
            .complete_sale(
                &fx.ctx(),
                cart(
                    vec![line(&plenty.id, 5, 100), line(&scarce.id, 3, 100)],
                    Some(fx.customer_id.as_str()),
                ),
            )
            .await
            .unwrap_err();

        match err {
            PosError::StockInsufficient {
                product_id,
                available,
                requested,
            } => {
                assert_eq!(product_id, scarce.id);
                assert_eq!(available, 1);
                assert_eq!(requested, 3);
            }
            other => panic!("expected StockInsufficient, got {other:?}"),
        }

        assert_eq!(fx.count("sales").await, 0);
        assert_eq!(fx.count("sale_items").await, 0);
        assert_eq!(fx.count("outbox").await, 0);
        assert_eq!(fx.stock_of(&plenty.id).await, 50);
        assert_eq!(fx.stock_of(&scarce.id).await, 1);
        assert_eq!(fx.customer(&fx.customer_id).await.loyalty_points, 0);
    }

    #[tokio::test]
    async fn test_validation_fails_before_any_write() {
        let fx = Fixture::new().await;
        let product = fx.product("V-1", 100, 5).await;
        let service = fx.checkout();

        let empty = service.complete_sale(&fx.ctx(), cart(vec![], None)).await;
        assert!(matches!(empty, Err(PosError::Validation(_))));

        let zero_qty = service
            .complete_sale(&fx.ctx(), cart(vec![line(&product.id, 0, 100)], None))
            .await;
        assert!(matches!(
            zero_qty,
            Err(PosError::Validation(ValidationError::MustBePositive { .. }))
        ));

        let negative_price = service
            .complete_sale(&fx.ctx(), cart(vec![line(&product.id, 1, -100)], None))
            .await;
        assert!(matches!(negative_price, Err(PosError::Validation(_))));

        assert_eq!(fx.count("sales").await, 0);
        assert_eq!(fx.stock_of(&product.id).await, 5);
    }

    #[tokio::test]
    async fn test_unknown_references_are_not_found() {
        let fx = Fixture::new().await;
        let product = fx.product("N-1", 100, 5).await;
        let service = fx.checkout();

        let missing_product = service
            .complete_sale(&fx.ctx(), cart(vec![line("no-such-product", 1, 100)], None))
            .await;
        assert!(matches!(
            missing_product,
            Err(PosError::NotFound { ref entity, .. }) if entity == "Product"
        ));

        let missing_customer = service
            .complete_sale(
                &fx.ctx(),
                cart(vec![line(&product.id, 1, 100)], Some("no-such-customer")),
            )
            .await;
        assert!(matches!(
            missing_customer,
            Err(PosError::NotFound { ref entity, .. }) if entity == "Customer"
        ));

        assert_eq!(fx.count("sales").await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_sales_lose_no_updates() {
        let fx = Fixture::new().await;
        let product = fx.product("HOT-1", 300, 10).await;
        let service = fx.checkout();
        let ctx = fx.ctx();

        let (a, b, c) = tokio::join!(
            service.complete_sale(&ctx, cart(vec![line(&product.id, 3, 300)], None)),
            service.complete_sale(&ctx, cart(vec![line(&product.id, 4, 300)], None)),
            service.complete_sale(&ctx, cart(vec![line(&product.id, 2, 300)], None)),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        assert_eq!(fx.stock_of(&product.id).await, 1);
        assert_eq!(fx.count("sales").await, 3);
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let fx = Fixture::new().await;
        let product = fx.product("LAST-1", 300, 5).await;
        let service = fx.checkout();
        let ctx = fx.ctx();

        let (a, b) = tokio::join!(
            service.complete_sale(&ctx, cart(vec![line(&product.id, 3, 300)], None)),
            service.complete_sale(&ctx, cart(vec![line(&product.id, 3, 300)], None)),
        );

        let failures = [a.is_err(), b.is_err()].iter().filter(|f| **f).count();
        assert_eq!(failures, 1);
        assert_eq!(fx.stock_of(&product.id).await, 2);
        assert_eq!(fx.count("sales").await, 1);
    }

    #[tokio::test]
    async fn test_overflowing_price_is_rejected_before_any_write() {
        let fx = Fixture::new().await;
        let product = fx.product("BIG-1", 100, 5).await;

        let result = fx
            .checkout()
            .complete_sale(
                &fx.ctx(),
                cart(vec![line(&product.id, 2, i64::MAX / 2 + 1)], None),
            )
            .await;
        assert!(matches!(
            result,
            Err(PosError::Validation(ValidationError::OutOfRange { .. }))
        ));

        assert_eq!(fx.count("sales").await, 0);
        assert_eq!(fx.stock_of(&product.id).await, 5);
    }

    #[tokio::test]
    async fn test_failed_outbox_write_rolls_back_the_sale() {
        let fx = Fixture::new().await;
        let product = fx.product("RB-1", 1200, 10).await;
        fx.execute(
            "CREATE TRIGGER fail_outbox BEFORE INSERT ON outbox \
             BEGIN SELECT RAISE(ABORT, 'outbox unavailable'); END",
        )
        .await;

        let result = fx
            .checkout()
            .complete_sale(
                &fx.ctx(),
                cart(vec![line(&product.id, 2, 1200)], Some(fx.customer_id.as_str())),
            )
            .await;
        assert!(matches!(result, Err(PosError::Persistence(_))));

        // Sale row, items and the stock decrement all happened before the
        // failing insert and must be gone.
        assert_eq!(fx.count("sales").await, 0);
        assert_eq!(fx.count("sale_items").await, 0);
        assert_eq!(fx.count("outbox").await, 0);
        assert_eq!(fx.stock_of(&product.id).await, 10);

        let customer = fx.customer(&fx.customer_id).await;
        assert_eq!(customer.loyalty_points, 0);
        assert_eq!(customer.total_spent_cents, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pooled_concurrent_sales_lose_no_updates() {
        let fx = Fixture::file_backed(5).await;
        let product = fx.product("POOL-1", 300, 20).await;

        let mut handles = Vec::new();
        for _ in 0..20 {
            let service = fx.checkout();
            let ctx = fx.ctx();
            let request = cart(vec![line(&product.id, 1, 300)], None);
            handles.push(tokio::spawn(async move {
                service.complete_sale(&ctx, request).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(fx.stock_of(&product.id).await, 0);
        assert_eq!(fx.count("sales").await, 20);
        assert_eq!(fx.count("sale_items").await, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pooled_concurrent_sales_never_oversell() {
        let fx = Fixture::file_backed(5).await;
        let product = fx.product("POOL-2", 300, 7).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let service = fx.checkout();
            let ctx = fx.ctx();
            let request = cart(vec![line(&product.id, 1, 300)], None);
            handles.push(tokio::spawn(async move {
                service.complete_sale(&ctx, request).await
            }));
        }

        let mut completed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => completed += 1,
                Err(PosError::StockInsufficient { available, .. }) => assert_eq!(available, 0),
                Err(other) => panic!("expected StockInsufficient, got {other:?}"),
            }
        }

        assert_eq!(completed, 7);
        assert_eq!(fx.stock_of(&product.id).await, 0);
        assert_eq!(fx.count("sales").await, 7);
    }

    #[tokio::test]
    async fn test_anonymous_sale_falls_back_to_first_shop() {
        let fx = Fixture::new().await;
        let product = fx.product("F-1", 100, 5).await;

        let outcome = fx
            .checkout()
            .complete_sale(&RequestContext::anonymous(), cart(vec![line(&product.id, 1, 100)], None))
            .await
            .unwrap();

        assert_eq!(outcome.attribution.source, AttributionSource::FirstShopFallback);
        assert_eq!(outcome.sale.shop_id.as_deref(), Some(fx.shop_id.as_str()));
        assert_eq!(outcome.sale.staff_id, None);
    }

    #[test]
    fn test_request_json_shape() {
        let json = r#"{
            "items": [{"product_id": "p1", "quantity": 2, "unit_price": 1200, "unit_cost": 600}],
            "customer_id": null,
            "payment_method": "mobile_money"
        }"#;
        let request: CheckoutRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.discount, Discount::None);
        assert_eq!(request.payment_method, PaymentMethod::MobileMoney);
        assert_eq!(request.items[0].unit_price, Money::from_cents(1200));
    }
}
