//! Mailing attempt repository

use crate::db::DatabasePool;
use crate::models::{AttemptStatus, MailingAttempt};
use async_trait::async_trait;
use mailwave_common::types::MailingId;
use mailwave_common::{Error, Result};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-status attempt counts for one mailing
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct AttemptCounts {
    pub success: i64,
    pub fail: i64,
}

/// Mailing attempt repository trait
#[async_trait]
pub trait MailingAttemptRepository: Send + Sync {
    /// Open an attempt in its placeholder state (`fail` / "attempt started").
    /// The row is a crash breadcrumb: a run that dies mid-loop leaves it
    /// visibly incomplete.
    async fn open(&self, mailing_id: MailingId, triggered_by: Option<&str>)
        -> Result<MailingAttempt>;
    /// Finalize an attempt opened by `open`. The single mutation this
    /// table ever sees.
    async fn finalize(&self, id: Uuid, status: AttemptStatus, response: &str) -> Result<()>;
    async fn list_by_mailing(
        &self,
        mailing_id: MailingId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MailingAttempt>>;
    async fn status_counts(&self, mailing_id: MailingId) -> Result<AttemptCounts>;
}

/// Database mailing attempt repository
pub struct DbMailingAttemptRepository {
    pool: DatabasePool,
}

impl DbMailingAttemptRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailingAttemptRepository for DbMailingAttemptRepository {
    async fn open(
        &self,
        mailing_id: MailingId,
        triggered_by: Option<&str>,
    ) -> Result<MailingAttempt> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, MailingAttempt>(
            r#"
            INSERT INTO mailing_attempts (id, mailing_id, status, server_response, triggered_by, attempted_at)
            VALUES ($1, $2, $3, 'attempt started', $4, $5)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(mailing_id)
        .bind(AttemptStatus::Fail.to_string())
        .bind(triggered_by)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn finalize(&self, id: Uuid, status: AttemptStatus, response: &str) -> Result<()> {
        sqlx::query("UPDATE mailing_attempts SET status = $2, server_response = $3 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .bind(response)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_by_mailing(
        &self,
        mailing_id: MailingId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MailingAttempt>> {
        sqlx::query_as::<_, MailingAttempt>(
            r#"
            SELECT * FROM mailing_attempts
            WHERE mailing_id = $1
            ORDER BY attempted_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(mailing_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn status_counts(&self, mailing_id: MailingId) -> Result<AttemptCounts> {
        sqlx::query_as::<_, AttemptCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'success') AS success,
                COUNT(*) FILTER (WHERE status = 'fail')    AS fail
            FROM mailing_attempts
            WHERE mailing_id = $1
            "#,
        )
        .bind(mailing_id)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
