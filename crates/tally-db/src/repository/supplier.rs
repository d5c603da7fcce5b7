//! # Supplier Repository

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use tally_core::Supplier;

#[derive(Debug, Clone, Default)]
pub struct NewSupplier {
    pub shop_id: Option<String>,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

pub struct SupplierRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SupplierRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SupplierRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(supplier)
    }

    pub async fn list(&mut self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY name")
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(suppliers)
    }

    pub async fn insert(&mut self, new: &NewSupplier) -> DbResult<Supplier> {
        let supplier = Supplier {
            id: new_id(),
            shop_id: new.shop_id.clone(),
            name: new.name.clone(),
            contact_name: new.contact_name.clone(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            created_at: Utc::now(),
        };

        debug!(id = %supplier.id, name = %supplier.name, "Inserting supplier");

        sqlx::query(
            r#"
            INSERT INTO suppliers (id, shop_id, name, contact_name, phone, email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&supplier.id)
        .bind(&supplier.shop_id)
        .bind(&supplier.name)
        .bind(&supplier.contact_name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(supplier.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(supplier)
    }
}
