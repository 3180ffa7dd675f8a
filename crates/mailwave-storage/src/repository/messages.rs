//! Message template repository

use crate::db::DatabasePool;
use crate::models::{CreateMessage, Message};
use async_trait::async_trait;
use mailwave_common::types::MessageId;
use mailwave_common::{Error, Result};
use uuid::Uuid;

/// Message repository trait
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn create(&self, input: CreateMessage) -> Result<Message>;
    async fn get(&self, id: MessageId) -> Result<Option<Message>>;
    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Message>>;
    async fn delete(&self, id: MessageId) -> Result<bool>;
}

/// Database message repository
pub struct DbMessageRepository {
    pool: DatabasePool,
}

impl DbMessageRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for DbMessageRepository {
    async fn create(&self, input: CreateMessage) -> Result<Message> {
        let input = input.normalized()?;
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, owner, subject, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.owner)
        .bind(&input.subject)
        .bind(&input.body)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get(&self, id: MessageId) -> Result<Option<Message>> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Message>> {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE owner = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete(&self, id: MessageId) -> Result<bool> {
        // FK RESTRICT from mailings keeps referenced templates alive,
        // preserving the history of what was sent.
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                    Error::validation("message", "message is referenced by a mailing")
                }
                other => Error::Database(other.to_string()),
            })?;
        Ok(result.rows_affected() > 0)
    }
}
