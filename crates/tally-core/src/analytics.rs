//! # Sales Analytics
//!
//! Pure aggregation over rows read from the store. The service layer does
//! the reads and passes `today` in, so every function here is deterministic.
//!
//! ```text
//! sales, sale items, expenses, products ──► summarize()        ──► SalesSummary
//! sale facts, line facts                 ──► advanced_metrics() ──► AdvancedAnalytics
//! ```
//!
//! Day and hour buckets are UTC.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Days, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Expense, Product, Sale, SaleItem};

/// Days covered by the revenue trend, today included.
pub const TREND_DAYS: u64 = 7;

/// Sales listed under "recent sales".
pub const RECENT_SALES_LIMIT: usize = 10;

/// Entries kept in the top-products and top-customers rankings.
pub const TOP_N: usize = 10;

/// Category label for products without one.
pub const UNCATEGORIZED: &str = "Uncategorized";

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyRevenue {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub revenue: Money,
}

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    pub total_revenue: Money,
    /// Cost of goods sold: Σ unit cost snapshot × quantity.
    pub total_cogs: Money,
    pub total_expenses: Money,
    /// revenue − COGS
    pub gross_profit: Money,
    /// gross profit − expenses
    pub net_profit: Money,
    /// Inventory valuation at cost.
    pub stock_value: Money,
    pub sales_count: i64,
    /// Oldest first.
    pub daily_trend: Vec<DailyRevenue>,
    /// Newest first.
    pub recent_sales: Vec<Sale>,
}

/// Builds the dashboard summary.
///
/// ## Arguments
/// * `sales` - Completed sales
/// * `items` - Their line items (for COGS)
/// * `expenses` - Recorded expenses
/// * `products` - Current catalog (for stock valuation)
/// * `today` - Last day of the trend window
pub fn summarize(
    sales: &[Sale],
    items: &[SaleItem],
    expenses: &[Expense],
    products: &[Product],
    today: NaiveDate,
) -> SalesSummary {
    let total_revenue: Money = sales.iter().map(Sale::total).sum();
    let total_cogs: Money = items.iter().map(SaleItem::line_cost).sum();
    let total_expenses: Money = expenses.iter().map(Expense::amount).sum();
    let stock_value: Money = products.iter().map(Product::stock_value).sum();
    let gross_profit = total_revenue - total_cogs;

    let mut recent: Vec<Sale> = sales.to_vec();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_SALES_LIMIT);

    SalesSummary {
        total_revenue,
        total_cogs,
        total_expenses,
        gross_profit,
        net_profit: gross_profit - total_expenses,
        stock_value,
        sales_count: sales.len() as i64,
        daily_trend: daily_trend(sales, today),
        recent_sales: recent,
    }
}

/// Revenue per UTC day for the `TREND_DAYS` days ending at `today`.
///
/// Days without sales are present with zero revenue.
pub fn daily_trend(sales: &[Sale], today: NaiveDate) -> Vec<DailyRevenue> {
    let start = today
        .checked_sub_days(Days::new(TREND_DAYS - 1))
        .unwrap_or(today);

    let mut buckets: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    let mut day = start;
    while day <= today {
        buckets.insert(day, Money::zero());
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    for sale in sales {
        if let Some(revenue) = buckets.get_mut(&sale.created_at.date_naive()) {
            *revenue += sale.total();
        }
    }

    buckets
        .into_iter()
        .map(|(date, revenue)| DailyRevenue { date, revenue })
        .collect()
}

// =============================================================================
// Advanced Analytics
// =============================================================================

/// A sale joined with its customer's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleFact {
    pub sale_id: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A sale item joined with its product and category names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LineFact {
    pub product_id: String,
    pub product_name: Option<String>,
    pub category_name: Option<String>,
    pub quantity: i64,
    pub total_price_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HourlyBucket {
    /// 0-23, UTC.
    pub hour: u32,
    pub revenue: Money,
    pub sales_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPerformance {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerPerformance {
    pub customer_id: String,
    pub name: String,
    pub visits: i64,
    pub spent: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryRevenue {
    pub category: String,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AdvancedAnalytics {
    /// Always 24 entries, hour 0 first.
    pub hourly: Vec<HourlyBucket>,
    pub top_products: Vec<ProductPerformance>,
    pub top_customers: Vec<CustomerPerformance>,
    pub category_mix: Vec<CategoryRevenue>,
    /// Share of identified customers with more than one sale, 0-100.
    pub retention_rate: f64,
}

/// Aggregates the advanced analytics view.
pub fn advanced_metrics(sales: &[SaleFact], lines: &[LineFact]) -> AdvancedAnalytics {
    AdvancedAnalytics {
        hourly: hourly_heatmap(sales),
        top_products: top_products(lines),
        top_customers: top_customers(sales),
        category_mix: category_mix(lines),
        retention_rate: retention_rate(sales),
    }
}

pub fn hourly_heatmap(sales: &[SaleFact]) -> Vec<HourlyBucket> {
    let mut buckets: Vec<HourlyBucket> = (0..24)
        .map(|hour| HourlyBucket {
            hour,
            revenue: Money::zero(),
            sales_count: 0,
        })
        .collect();

    for sale in sales {
        let bucket = &mut buckets[sale.created_at.hour() as usize];
        bucket.revenue += Money::from_cents(sale.total_cents);
        bucket.sales_count += 1;
    }

    buckets
}

pub fn top_products(lines: &[LineFact]) -> Vec<ProductPerformance> {
    let mut by_product: HashMap<&str, ProductPerformance> = HashMap::new();
    for line in lines {
        let entry = by_product
            .entry(line.product_id.as_str())
            .or_insert_with(|| ProductPerformance {
                product_id: line.product_id.clone(),
                name: line
                    .product_name
                    .clone()
                    .unwrap_or_else(|| "Unknown product".to_string()),
                quantity: 0,
                revenue: Money::zero(),
            });
        entry.quantity += line.quantity;
        entry.revenue += Money::from_cents(line.total_price_cents);
    }

    let mut ranked: Vec<ProductPerformance> = by_product.into_values().collect();
    ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(TOP_N);
    ranked
}

pub fn top_customers(sales: &[SaleFact]) -> Vec<CustomerPerformance> {
    let mut by_customer: HashMap<&str, CustomerPerformance> = HashMap::new();
    for sale in sales {
        let Some(customer_id) = sale.customer_id.as_deref() else {
            continue;
        };
        let entry = by_customer
            .entry(customer_id)
            .or_insert_with(|| CustomerPerformance {
                customer_id: customer_id.to_string(),
                name: sale
                    .customer_name
                    .clone()
                    .unwrap_or_else(|| "Unknown customer".to_string()),
                visits: 0,
                spent: Money::zero(),
            });
        entry.visits += 1;
        entry.spent += Money::from_cents(sale.total_cents);
    }

    let mut ranked: Vec<CustomerPerformance> = by_customer.into_values().collect();
    ranked.sort_by(|a, b| b.spent.cmp(&a.spent).then_with(|| a.name.cmp(&b.name)));
    ranked.truncate(TOP_N);
    ranked
}

/// Revenue per category, highest first.
pub fn category_mix(lines: &[LineFact]) -> Vec<CategoryRevenue> {
    let mut by_category: HashMap<String, Money> = HashMap::new();
    for line in lines {
        let category = line
            .category_name
            .clone()
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        *by_category.entry(category).or_default() += Money::from_cents(line.total_price_cents);
    }

    let mut mix: Vec<CategoryRevenue> = by_category
        .into_iter()
        .map(|(category, revenue)| CategoryRevenue { category, revenue })
        .collect();
    mix.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.category.cmp(&b.category)));
    mix
}

/// Repeat customers / distinct customers × 100. Walk-in sales are ignored.
pub fn retention_rate(sales: &[SaleFact]) -> f64 {
    let mut visits: HashMap<&str, i64> = HashMap::new();
    for sale in sales {
        if let Some(customer_id) = sale.customer_id.as_deref() {
            *visits.entry(customer_id).or_default() += 1;
        }
    }

    if visits.is_empty() {
        return 0.0;
    }

    let repeat = visits.values().filter(|&&n| n > 1).count();
    repeat as f64 / visits.len() as f64 * 100.0
}

// =============================================================================
// Unit Tests
// =============================================================================
