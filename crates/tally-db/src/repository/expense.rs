//! # Expense Repository

use chrono::{NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use tally_core::Expense;

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub shop_id: Option<String>,
    pub description: String,
    pub category: String,
    pub amount_cents: i64,
    pub expense_date: NaiveDate,
    pub vendor: Option<String>,
}

pub struct ExpenseRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ExpenseRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ExpenseRepository { conn }
    }

    pub async fn insert(&mut self, new: &NewExpense) -> DbResult<Expense> {
        let expense = Expense {
            id: new_id(),
            shop_id: new.shop_id.clone(),
            description: new.description.clone(),
            category: new.category.clone(),
            amount_cents: new.amount_cents,
            expense_date: new.expense_date,
            vendor: new.vendor.clone(),
            created_at: Utc::now(),
        };

        debug!(id = %expense.id, amount_cents = expense.amount_cents, "Inserting expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, shop_id, description, category, amount_cents, expense_date, vendor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.shop_id)
        .bind(&expense.description)
        .bind(&expense.category)
        .bind(expense.amount_cents)
        .bind(expense.expense_date)
        .bind(&expense.vendor)
        .bind(expense.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(expense)
    }

    /// Most recent expense date first.
    pub async fn list(&mut self) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            "SELECT * FROM expenses ORDER BY expense_date DESC, created_at DESC, rowid DESC",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(expenses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};

    fn rent(amount_cents: i64, day: u32) -> NewExpense {
        NewExpense {
            shop_id: None,
            description: "Shop rent".to_string(),
            category: "Rent".to_string(),
            amount_cents,
            expense_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            vendor: None,
        }
    }

    #[tokio::test]
    async fn test_list_newest_date_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ExpenseRepository::new(&mut conn);

        repo.insert(&rent(50_000, 1)).await.unwrap();
        repo.insert(&rent(7_500, 15)).await.unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed[0].amount_cents, 7_500);
        assert_eq!(listed[1].expense_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[tokio::test]
    async fn test_zero_amount_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();

        let err = ExpenseRepository::new(&mut conn).insert(&rent(0, 1)).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
