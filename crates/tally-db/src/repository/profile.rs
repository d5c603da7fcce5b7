//! # Profile Repository
//!
//! Staff profiles. Authentication lives outside this system; a profile only
//! links a staff id to a role and a home shop.

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::DbResult;
use tally_core::Profile;

pub struct ProfileRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProfileRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProfileRepository { conn }
    }

    pub async fn get_by_id(&mut self, id: &str) -> DbResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(profile)
    }

    /// Inserts a profile under a caller-supplied id (the auth provider's user id).
    pub async fn insert(
        &mut self,
        id: &str,
        full_name: Option<&str>,
        role: &str,
        shop_id: Option<&str>,
    ) -> DbResult<Profile> {
        let profile = Profile {
            id: id.to_string(),
            full_name: full_name.map(str::to_string),
            role: role.to_string(),
            shop_id: shop_id.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO profiles (id, full_name, role, shop_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.role)
        .bind(&profile.shop_id)
        .bind(profile.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_insert_without_shop() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProfileRepository::new(&mut conn);

        repo.insert("staff-1", Some("Esi Owusu"), "cashier", None).await.unwrap();
        let profile = repo.get_by_id("staff-1").await.unwrap().unwrap();
        assert_eq!(profile.role, "cashier");
        assert_eq!(profile.shop_id, None);
        assert!(repo.get_by_id("staff-2").await.unwrap().is_none());
    }
}
