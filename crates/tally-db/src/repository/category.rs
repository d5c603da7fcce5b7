//! # Category Repository
//!
//! Category names are unique, compared case-insensitively.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use tally_core::Category;

pub struct CategoryRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CategoryRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CategoryRepository { conn }
    }

    /// All categories ordered by name.
    pub async fn list(&mut self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name COLLATE NOCASE")
                .fetch_all(&mut *self.conn)
                .await?;

        Ok(categories)
    }

    pub async fn find_by_name(&mut self, name: &str) -> DbResult<Option<Category>> {
        let category =
            sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE name = ?1")
                .bind(name)
                .fetch_optional(&mut *self.conn)
                .await?;

        Ok(category)
    }

    pub async fn insert(&mut self, name: &str) -> DbResult<Category> {
        let category = Category {
            id: new_id(),
            name: name.to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %category.id, name = %category.name, "Inserting category");

        sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&category.id)
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&mut *self.conn)
            .await?;

        Ok(category)
    }

    /// Returns the category called `name`, creating it if needed.
    pub async fn find_or_create(&mut self, name: &str) -> DbResult<Category> {
        if let Some(existing) = self.find_by_name(name).await? {
            return Ok(existing);
        }
        self.insert(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_find_or_create_is_case_insensitive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let mut repo = CategoryRepository::new(&mut conn);

        let first = repo.find_or_create("Pain Relief").await.unwrap();
        let again = repo.find_or_create("pain relief").await.unwrap();
        assert_eq!(first.id, again.id);

        repo.find_or_create("Antibiotics").await.unwrap();
        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Antibiotics", "Pain Relief"]);
    }
}
