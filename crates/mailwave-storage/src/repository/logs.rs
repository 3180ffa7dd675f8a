//! Mailing log repository

use crate::db::DatabasePool;
use crate::models::{CreateMailingLog, MailingLog};
use async_trait::async_trait;
use mailwave_common::types::MailingId;
use mailwave_common::{Error, Result};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-status log counts for one mailing
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct LogCounts {
    pub sent: i64,
    pub failed: i64,
    pub dry_run: i64,
}

/// Mailing log repository trait
#[async_trait]
pub trait MailingLogRepository: Send + Sync {
    async fn create(&self, input: CreateMailingLog) -> Result<MailingLog>;
    async fn list_by_mailing(
        &self,
        mailing_id: MailingId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MailingLog>>;
    /// Counts computed from the authoritative log table
    async fn status_counts(&self, mailing_id: MailingId) -> Result<LogCounts>;
}

/// Database mailing log repository
pub struct DbMailingLogRepository {
    pool: DatabasePool,
}

impl DbMailingLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailingLogRepository for DbMailingLogRepository {
    async fn create(&self, input: CreateMailingLog) -> Result<MailingLog> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query_as::<_, MailingLog>(
            r#"
            INSERT INTO mailing_logs (id, mailing_id, recipient, status, detail, triggered_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.mailing_id)
        .bind(&input.recipient)
        .bind(input.status.to_string())
        .bind(&input.detail)
        .bind(&input.triggered_by)
        .bind(now)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn list_by_mailing(
        &self,
        mailing_id: MailingId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MailingLog>> {
        sqlx::query_as::<_, MailingLog>(
            r#"
            SELECT * FROM mailing_logs
            WHERE mailing_id = $1
            ORDER BY created_at DESC
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

    async fn status_counts(&self, mailing_id: MailingId) -> Result<LogCounts> {
        sqlx::query_as::<_, LogCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'sent')    AS sent,
                COUNT(*) FILTER (WHERE status = 'error')   AS failed,
                COUNT(*) FILTER (WHERE status = 'dry_run') AS dry_run
            FROM mailing_logs
            WHERE mailing_id = $1
            "#,
        )
        .bind(mailing_id)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
