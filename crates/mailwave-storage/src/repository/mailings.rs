//! Mailing repository

use crate::db::DatabasePool;
use crate::models::{CreateMailing, Mailing, MailingStatus, Recipient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailwave_common::types::{MailingId, RecipientId};
use mailwave_common::{Error, Result};
use uuid::Uuid;

/// Mailing repository trait
#[async_trait]
pub trait MailingRepository: Send + Sync {
    async fn create(&self, input: CreateMailing, status: MailingStatus) -> Result<Mailing>;
    async fn get(&self, id: MailingId) -> Result<Option<Mailing>>;
    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Mailing>>;
    async fn recipients(&self, id: MailingId) -> Result<Vec<Recipient>>;
    async fn set_recipients(&self, id: MailingId, recipient_ids: &[RecipientId]) -> Result<()>;
    async fn update_window(
        &self,
        id: MailingId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        status: MailingStatus,
    ) -> Result<Option<Mailing>>;
    /// Persist only the status and updated-at columns
    async fn update_status(&self, id: MailingId, status: MailingStatus) -> Result<()>;
    /// Stamp the last real send and mark the mailing running
    async fn mark_sent(&self, id: MailingId, at: DateTime<Utc>, status: MailingStatus)
        -> Result<()>;
    /// Mailings whose window is open, not finished, and outside the
    /// re-dispatch cooldown (`last_sent_at <= cutoff` or never sent)
    async fn find_due(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<Vec<Mailing>>;
    /// Delete a mailing that has never really sent. Returns false when
    /// the id is unknown; refuses mailings with send history.
    async fn delete_unsent(&self, id: MailingId) -> Result<bool>;
}

/// Database mailing repository
pub struct DbMailingRepository {
    pool: DatabasePool,
}

impl DbMailingRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailingRepository for DbMailingRepository {
    async fn create(&self, input: CreateMailing, status: MailingStatus) -> Result<Mailing> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let mailing = sqlx::query_as::<_, Mailing>(
            r#"
            INSERT INTO mailings (id, owner, start_at, end_at, status, message_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.owner)
        .bind(input.start_at)
        .bind(input.end_at)
        .bind(status.to_string())
        .bind(input.message_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        for recipient_id in &input.recipient_ids {
            sqlx::query(
                "INSERT INTO mailing_recipients (mailing_id, recipient_id) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(recipient_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(mailing)
    }

    async fn get(&self, id: MailingId) -> Result<Option<Mailing>> {
        sqlx::query_as::<_, Mailing>("SELECT * FROM mailings WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_owner(&self, owner: &str, limit: i64, offset: i64) -> Result<Vec<Mailing>> {
        sqlx::query_as::<_, Mailing>(
            "SELECT * FROM mailings WHERE owner = $1 ORDER BY start_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn recipients(&self, id: MailingId) -> Result<Vec<Recipient>> {
        sqlx::query_as::<_, Recipient>(
            r#"
            SELECT r.* FROM recipients r
            JOIN mailing_recipients mr ON mr.recipient_id = r.id
            WHERE mr.mailing_id = $1
            ORDER BY r.full_name, r.email
            "#,
        )
        .bind(id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn set_recipients(&self, id: MailingId, recipient_ids: &[RecipientId]) -> Result<()> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query("DELETE FROM mailing_recipients WHERE mailing_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        for recipient_id in recipient_ids {
            sqlx::query(
                "INSERT INTO mailing_recipients (mailing_id, recipient_id) VALUES ($1, $2)",
            )
            .bind(id)
            .bind(recipient_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update_window(
        &self,
        id: MailingId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        status: MailingStatus,
    ) -> Result<Option<Mailing>> {
        sqlx::query_as::<_, Mailing>(
            r#"
            UPDATE mailings SET
                start_at = $2,
                end_at = $3,
                status = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(start_at)
        .bind(end_at)
        .bind(status.to_string())
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn update_status(&self, id: MailingId, status: MailingStatus) -> Result<()> {
        sqlx::query("UPDATE mailings SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn mark_sent(
        &self,
        id: MailingId,
        at: DateTime<Utc>,
        status: MailingStatus,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE mailings SET last_sent_at = $2, status = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .bind(status.to_string())
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn find_due(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> Result<Vec<Mailing>> {
        sqlx::query_as::<_, Mailing>(
            r#"
            SELECT * FROM mailings
            WHERE start_at <= $1
              AND end_at >= $1
              AND status IN ('created', 'running')
              AND (last_sent_at IS NULL OR last_sent_at <= $2)
            ORDER BY start_at ASC
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn delete_unsent(&self, id: MailingId) -> Result<bool> {
        let existing = self.get(id).await?;
        match existing {
            None => Ok(false),
            Some(m) if m.has_ever_sent() => Err(Error::validation(
                "mailing",
                "mailing has send history and cannot be deleted",
            )),
            Some(_) => {
                let result = sqlx::query("DELETE FROM mailings WHERE id = $1")
                    .bind(id)
                    .execute(self.pool.pool())
                    .await
                    .map_err(|e| Error::Database(e.to_string()))?;
                Ok(result.rows_affected() > 0)
            }
        }
    }
}
