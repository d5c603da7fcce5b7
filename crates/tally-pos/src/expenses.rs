//! # Expense Service
//!
//! Operating costs, subtracted from gross profit in the sales summary.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use ts_rs::TS;

use tally_core::validation::{validate_name, validate_optional_text, validate_positive_cents};
use tally_core::{Expense, Money, RequestContext};
use tally_db::{Database, ExpenseRepository, NewExpense};

use crate::attribution::AttributionResolver;
use crate::error::PosResult;
use crate::retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpenseInput {
    pub description: String,
    pub category: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    #[serde(default)]
    pub vendor: Option<String>,
}

pub struct ExpenseService {
    db: Arc<Database>,
    attribution: AttributionResolver,
    retry: RetryPolicy,
}

impl ExpenseService {
    pub fn new(db: Arc<Database>, attribution: AttributionResolver, retry: RetryPolicy) -> Self {
        ExpenseService {
            db,
            attribution,
            retry,
        }
    }

    #[instrument(skip(self, ctx, input))]
    pub async fn create_expense(&self, ctx: &RequestContext, input: ExpenseInput) -> PosResult<Expense> {
        let description = validate_name("description", &input.description, 500)?;
        let category = validate_name("category", &input.category, 100)?;
        validate_positive_cents("amount", input.amount.cents())?;
        let vendor = validate_optional_text("vendor", input.vendor.as_deref(), 200)?;

        let mut conn = self.db.acquire().await?;
        let attribution = self.attribution.resolve(&mut conn, ctx).await;
        let expense = ExpenseRepository::new(&mut conn)
            .insert(&NewExpense {
                shop_id: attribution.shop_id,
                description,
                category,
                amount_cents: input.amount.cents(),
                expense_date: input.expense_date,
                vendor,
            })
            .await?;

        info!(expense_id = %expense.id, amount = %input.amount, "Expense recorded");
        Ok(expense)
    }

    /// Expenses by date, newest first.
    pub async fn list_expenses(&self) -> PosResult<Vec<Expense>> {
        let db = &self.db;
        with_retry(self.retry, || async move {
            let mut conn = db.acquire().await?;
            Ok(ExpenseRepository::new(&mut conn).list().await?)
        })
        .await
    }
}
