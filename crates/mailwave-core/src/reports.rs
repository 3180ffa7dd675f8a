//! Reporting rollups
//!
//! Counts are always computed from the log and attempt tables, never
//! maintained as counters, so they cannot drift from the audit trail. A
//! short TTL cache in front keeps repeated reads off the database.

use mailwave_common::types::MailingId;
use mailwave_common::Result;
use mailwave_storage::models::MailingStats;
use mailwave_storage::repository::attempts::MailingAttemptRepository;
use mailwave_storage::repository::logs::MailingLogRepository;
use mailwave_storage::repository::mailings::MailingRepository;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const OWNER_PAGE_SIZE: i64 = 200;

/// Reporting service
pub struct ReportService {
    mailings: Arc<dyn MailingRepository>,
    logs: Arc<dyn MailingLogRepository>,
    attempts: Arc<dyn MailingAttemptRepository>,
    ttl: Duration,
    cache: RwLock<HashMap<MailingId, (Instant, MailingStats)>>,
}

impl ReportService {
    pub fn new(
        mailings: Arc<dyn MailingRepository>,
        logs: Arc<dyn MailingLogRepository>,
        attempts: Arc<dyn MailingAttemptRepository>,
        ttl: Duration,
    ) -> Self {
        Self {
            mailings,
            logs,
            attempts,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Per-mailing rollup, served from cache within the TTL. Stale by at
    /// most the TTL; a dispatch finishing between reads shows up on the
    /// next refresh.
    pub async fn mailing_stats(&self, id: MailingId) -> Result<MailingStats> {
        if !self.ttl.is_zero() {
            if let Some((cached_at, stats)) = self.cache.read().await.get(&id) {
                if cached_at.elapsed() < self.ttl {
                    return Ok(*stats);
                }
            }
        }

        let stats = self.query_stats(id).await?;

        if !self.ttl.is_zero() {
            let mut cache = self.cache.write().await;
            // Expired entries are dropped here so the map is bounded by
            // the set of mailings read within one TTL.
            cache.retain(|_, (cached_at, _)| cached_at.elapsed() < self.ttl);
            cache.insert(id, (Instant::now(), stats));
        }

        Ok(stats)
    }

    /// Rollup across every mailing an owner has, cache-assisted per
    /// mailing.
    pub async fn owner_summary(&self, owner: &str) -> Result<MailingStats> {
        let mut summary = MailingStats::default();
        let mut offset = 0i64;

        loop {
            let page = self
                .mailings
                .list_by_owner(owner, OWNER_PAGE_SIZE, offset)
                .await?;
            let fetched = page.len();

            for mailing in page {
                summary.merge(&self.mailing_stats(mailing.id).await?);
            }

            if (fetched as i64) < OWNER_PAGE_SIZE {
                break;
            }
            offset += OWNER_PAGE_SIZE;
        }

        Ok(summary)
    }

    /// Drop a cached entry, forcing the next read to hit the tables.
    /// For callers that just changed the underlying history and cannot
    /// tolerate a TTL-stale read.
    pub async fn invalidate(&self, id: MailingId) {
        self.cache.write().await.remove(&id);
    }

    #[cfg(test)]
    async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }

    async fn query_stats(&self, id: MailingId) -> Result<MailingStats> {
        let log_counts = self.logs.status_counts(id).await?;
        let attempt_counts = self.attempts.status_counts(id).await?;

        debug!(mailing_id = %id, "report counts refreshed");

        Ok(MailingStats {
            sent: log_counts.sent,
            failed: log_counts.failed,
            dry_run: log_counts.dry_run,
            attempt_success: attempt_counts.success,
            attempt_fail: attempt_counts.fail,
        })
    }
}
