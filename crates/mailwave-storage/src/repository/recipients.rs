//! Recipient repository

use crate::db::DatabasePool;
use crate::models::{CreateRecipient, Recipient};
use async_trait::async_trait;
use mailwave_common::types::RecipientId;
use mailwave_common::{Error, Result};
use uuid::Uuid;

/// Recipient repository trait
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    async fn create(&self, input: CreateRecipient) -> Result<Recipient>;
    async fn get(&self, id: RecipientId) -> Result<Option<Recipient>>;
    async fn get_by_email(&self, email: &str) -> Result<Option<Recipient>>;
    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Recipient>>;
    async fn delete(&self, id: RecipientId) -> Result<bool>;
}

/// Database recipient repository
pub struct DbRecipientRepository {
    pool: DatabasePool,
}

impl DbRecipientRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientRepository for DbRecipientRepository {
    async fn create(&self, input: CreateRecipient) -> Result<Recipient> {
        let input = input.normalized()?;
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, Recipient>(
            r#"
            INSERT INTO recipients (id, owner, email, full_name, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.owner)
        .bind(&input.email)
        .bind(&input.full_name)
        .bind(&input.comment)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Error::validation("email", "a recipient with this email already exists")
            }
            other => Error::Database(other.to_string()),
        })
    }

    async fn get(&self, id: RecipientId) -> Result<Option<Recipient>> {
        sqlx::query_as::<_, Recipient>("SELECT * FROM recipients WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Recipient>> {
        let email = mailwave_common::types::normalize_email(email);
        sqlx::query_as::<_, Recipient>("SELECT * FROM recipients WHERE email = $1")
            .bind(email)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Recipient>> {
        sqlx::query_as::<_, Recipient>(
            "SELECT * FROM recipients WHERE owner = $1 ORDER BY full_name, email LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete(&self, id: RecipientId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM recipients WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
