//! Cooperative TTL locks backed by the database
//!
//! The scheduler uses one named lock to guarantee that at most one
//! instance is scanning for due mailings at a time, even across
//! processes. The TTL bounds how long a crashed holder can block the
//! system.

use crate::db::DatabasePool;
use async_trait::async_trait;
use chrono::Duration;
use mailwave_common::{Error, Result};

/// Mutual-exclusion primitive with TTL semantics
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Try to acquire the named lock. Returns false when another holder
    /// currently owns it (not an error).
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool>;
    /// Release the named lock. Releasing a lock that is not held is a no-op.
    async fn release(&self, key: &str) -> Result<()>;
}

/// Database lock provider over the `scheduler_locks` table
pub struct DbLockProvider {
    pool: DatabasePool,
}

impl DbLockProvider {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockProvider for DbLockProvider {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = chrono::Utc::now();
        let expires_at = now + ttl;

        // The upsert only succeeds when the row is absent or its TTL has
        // lapsed, so a live holder cannot be displaced.
        let result = sqlx::query(
            r#"
            INSERT INTO scheduler_locks (name, acquired_at, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET acquired_at = EXCLUDED.acquired_at,
                expires_at = EXCLUDED.expires_at
            WHERE scheduler_locks.expires_at <= $2
            "#,
        )
        .bind(key)
        .bind(now)
        .bind(expires_at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM scheduler_locks WHERE name = $1")
            .bind(key)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
