//! # Shop Repository
//!
//! The earliest-created shop doubles as the tenancy fallback, so
//! [`ShopRepository::first`] orders by creation time with `rowid` as tiebreak.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};
use tally_core::Shop;

#[derive(Debug, Clone)]
pub struct ShopDetails {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub currency: String,
}

pub struct ShopRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ShopRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ShopRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>("SELECT * FROM shops WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(shop)
    }

    /// The earliest-created shop.
    pub async fn first(&mut self) -> DbResult<Option<Shop>> {
        let shop =
            sqlx::query_as::<_, Shop>("SELECT * FROM shops ORDER BY created_at, rowid LIMIT 1")
                .fetch_optional(&mut *self.conn)
                .await?;

        Ok(shop)
    }

    pub async fn insert(&mut self, details: &ShopDetails) -> DbResult<Shop> {
        let now = Utc::now();
        let shop = Shop {
            id: new_id(),
            name: details.name.clone(),
            address: details.address.clone(),
            phone: details.phone.clone(),
            currency: details.currency.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(id = %shop.id, name = %shop.name, "Inserting shop");

        sqlx::query(
            r#"
            INSERT INTO shops (id, name, address, phone, currency, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&shop.id)
        .bind(&shop.name)
        .bind(&shop.address)
        .bind(&shop.phone)
        .bind(&shop.currency)
        .bind(shop.created_at)
        .bind(shop.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(shop)
    }

    pub async fn update(&mut self, id: &str, details: &ShopDetails) -> DbResult<Shop> {
        let shop = sqlx::query_as::<_, Shop>(
            r#"
            UPDATE shops
            SET name = ?2, address = ?3, phone = ?4, currency = ?5, updated_at = ?6
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&details.name)
        .bind(&details.address)
        .bind(&details.phone)
        .bind(&details.currency)
        .bind(Utc::now())
        .fetch_optional(&mut *self.conn)
        .await?;

        shop.ok_or_else(|| DbError::not_found("Shop", id))
    }
}
