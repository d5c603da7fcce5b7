//! # Analytics Service
//!
//! Feeds repository reads into the pure aggregations of
//! `tally_core::analytics`. Read-only, so every call is retried on
//! transient store errors.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use tally_core::analytics::{self, AdvancedAnalytics, SalesSummary};
use tally_db::{Database, ExpenseRepository, ProductRepository, SaleRepository};

use crate::error::PosResult;
use crate::retry::{with_retry, RetryPolicy};

pub struct AnalyticsService {
    db: Arc<Database>,
    retry: RetryPolicy,
}

impl AnalyticsService {
    pub fn new(db: Arc<Database>, retry: RetryPolicy) -> Self {
        AnalyticsService { db, retry }
    }

    /// Revenue, COGS, expenses, profit, stock value, the 7-day trend ending
    /// today (UTC) and the most recent sales.
    pub async fn sales_summary(&self) -> PosResult<SalesSummary> {
        self.sales_summary_at(Utc::now()).await
    }

    pub async fn sales_summary_at(&self, now: DateTime<Utc>) -> PosResult<SalesSummary> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            let sales = SaleRepository::new(&mut conn).list_completed(None).await?;
            let items = SaleRepository::new(&mut conn).list_items(None).await?;
            let expenses = ExpenseRepository::new(&mut conn).list().await?;
            let products = ProductRepository::new(&mut conn).list_all().await?;

            debug!(
                sales = sales.len(),
                items = items.len(),
                expenses = expenses.len(),
                "Building sales summary"
            );

            Ok(analytics::summarize(
                &sales,
                &items,
                &expenses,
                &products,
                now.date_naive(),
            ))
        })
        .await
    }

    /// Hourly heatmap, top products and customers, category mix and
    /// retention, over sales at or after `since` (all sales when `None`).
    pub async fn advanced_analytics(&self, since: Option<DateTime<Utc>>) -> PosResult<AdvancedAnalytics> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            let sales = SaleRepository::new(&mut conn).sale_facts(since).await?;
            let lines = SaleRepository::new(&mut conn).line_facts(since).await?;

            Ok(analytics::advanced_metrics(&sales, &lines))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::CheckoutRequest;
    use crate::testing::Fixture;
    use chrono::Duration;
    use tally_core::pricing::{CartLine, Discount};
    use tally_core::{Money, PaymentMethod};
    use tally_db::NewExpense;

    #[tokio::test]
    async fn test_summary_after_sales() {
        let fx = Fixture::new().await;
        let product = fx.product("PAN-1", 1200, 10).await;
        let checkout = fx.checkout();

        for customer in [Some(fx.customer_id.clone()), None] {
            checkout
                .complete_sale(
                    &fx.ctx(),
                    CheckoutRequest {
                        items: vec![CartLine::new(
                            product.id.as_str(),
                            2,
                            Money::from_cents(1200),
                            Money::from_cents(600),
                        )],
                        customer_id: customer,
                        discount: Discount::None,
                        payment_method: PaymentMethod::Cash,
                    },
                )
                .await
                .unwrap();
        }

        let mut conn = fx.db.acquire().await.unwrap();
        ExpenseRepository::new(&mut conn)
            .insert(&NewExpense {
                shop_id: Some(fx.shop_id.clone()),
                description: "Rent".to_string(),
                category: "Premises".to_string(),
                amount_cents: 1000,
                expense_date: Utc::now().date_naive(),
                vendor: None,
            })
            .await
            .unwrap();
        drop(conn);

        let service = AnalyticsService::new(fx.db.clone(), RetryPolicy::default());
        let summary = service.sales_summary().await.unwrap();

        assert_eq!(summary.sales_count, 2);
        assert_eq!(summary.total_revenue, Money::from_cents(5040));
        assert_eq!(summary.total_cogs, Money::from_cents(2400));
        assert_eq!(summary.gross_profit, Money::from_cents(2640));
        assert_eq!(summary.net_profit, Money::from_cents(1640));
        // 6 left at cost 600
        assert_eq!(summary.stock_value, Money::from_cents(3600));
        assert_eq!(summary.daily_trend.len(), 7);
        assert_eq!(summary.daily_trend[6].revenue, Money::from_cents(5040));

        let advanced = service.advanced_analytics(None).await.unwrap();
        assert_eq!(advanced.hourly.len(), 24);
        assert_eq!(advanced.top_products[0].quantity, 4);
        assert_eq!(advanced.top_customers.len(), 1);

        let future = service
            .advanced_analytics(Some(Utc::now() + Duration::hours(1)))
            .await
            .unwrap();
        assert!(future.top_products.is_empty());
    }
}
