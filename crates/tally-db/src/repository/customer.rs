//! # Customer Repository
//!
//! CRM rows plus the running loyalty totals (`total_spent_cents`,
//! `loyalty_points`). Loyalty totals only move through [`CustomerRepository::add_loyalty`],
//! which the outbox processor calls once per sale.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};
use tally_core::Customer;

/// Fields for a new customer.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub shop_id: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub struct CustomerRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CustomerRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CustomerRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(customer)
    }

    /// Newest customers first.
    pub async fn list(&mut self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(customers)
    }

    /// Matches name, phone or email by substring.
    pub async fn search(&mut self, query: &str, limit: u32) -> DbResult<Vec<Customer>> {
        let pattern = format!("%{}%", query);

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE full_name LIKE ?1 OR phone LIKE ?1 OR email LIKE ?1
            ORDER BY full_name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(customers)
    }

    pub async fn insert(&mut self, new: &NewCustomer) -> DbResult<Customer> {
        let now = Utc::now();
        let customer = Customer {
            id: new_id(),
            shop_id: new.shop_id.clone(),
            full_name: new.full_name.clone(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            total_spent_cents: 0,
            loyalty_points: 0,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, shop_id, full_name, phone, email,
                total_spent_cents, loyalty_points, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.shop_id)
        .bind(&customer.full_name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(customer)
    }

    /// Replaces name, phone and email. Loyalty totals are untouched.
    pub async fn update_contact(
        &mut self,
        id: &str,
        full_name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> DbResult<Customer> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET full_name = ?2, phone = ?3, email = ?4, updated_at = ?5
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(phone)
        .bind(email)
        .bind(Utc::now())
        .fetch_optional(&mut *self.conn)
        .await?;

        customer.ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Adds a completed sale's amount and points to the running totals.
    ///
    /// A single relative UPDATE, so concurrent accruals never overwrite
    /// each other.
    pub async fn add_loyalty(&mut self, id: &str, amount_cents: i64, points: i64) -> DbResult<Customer> {
        debug!(id = %id, amount_cents, points, "Adding loyalty");

        let customer = sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET total_spent_cents = total_spent_cents + ?2,
                loyalty_points = loyalty_points + ?3,
                updated_at = ?4
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(amount_cents)
        .bind(points)
        .bind(Utc::now())
        .fetch_optional(&mut *self.conn)
        .await?;

        customer.ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn ama() -> NewCustomer {
        NewCustomer {
            full_name: "Ama Ghana".to_string(),
            phone: Some("0241234567".to_string()),
            email: Some("ama@example.com".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_search() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = CustomerRepository::new(&mut conn);

        let created = repo.insert(&ama()).await.unwrap();
        assert_eq!(created.loyalty_points, 0);

        assert_eq!(repo.search("Ama", 10).await.unwrap().len(), 1);
        assert_eq!(repo.search("024123", 10).await.unwrap().len(), 1);
        assert_eq!(repo.search("example.com", 10).await.unwrap().len(), 1);
        assert!(repo.search("Kojo", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_loyalty_accumulates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = CustomerRepository::new(&mut conn);
        let created = repo.insert(&ama()).await.unwrap();

        repo.add_loyalty(&created.id, 2520, 2).await.unwrap();
        let updated = repo.add_loyalty(&created.id, 1000, 1).await.unwrap();

        assert_eq!(updated.total_spent_cents, 3520);
        assert_eq!(updated.loyalty_points, 3);
    }

    #[tokio::test]
    async fn test_update_contact_and_missing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = CustomerRepository::new(&mut conn);
        let created = repo.insert(&ama()).await.unwrap();

        let updated = repo
            .update_contact(&created.id, "Ama Mensah", None, None)
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Ama Mensah");
        assert_eq!(updated.phone, None);

        let err = repo.add_loyalty("missing", 100, 0).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
