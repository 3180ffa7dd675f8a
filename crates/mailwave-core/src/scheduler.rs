//! Due-mailing scheduler
//!
//! A periodic driver that finds mailings whose window is open and hands
//! each to the dispatch engine. A TTL lock keyed by a fixed name keeps
//! overlapping ticks (or multiple scheduler processes) from scanning
//! concurrently; a tick that loses the lock does nothing and reports 0.

use crate::clock::Clock;
use crate::dispatch::Dispatcher;
use crate::status::compute_status;
use chrono::Duration;
use mailwave_common::config::SchedulerConfig;
use mailwave_common::Result;
use mailwave_storage::repository::locks::LockProvider;
use mailwave_storage::repository::mailings::MailingRepository;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Due-mailing scheduler
pub struct DueMailingScheduler {
    dispatcher: Arc<Dispatcher>,
    mailings: Arc<dyn MailingRepository>,
    lock: Arc<dyn LockProvider>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl DueMailingScheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        mailings: Arc<dyn MailingRepository>,
        lock: Arc<dyn LockProvider>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            dispatcher,
            mailings,
            lock,
            clock,
            config,
        }
    }

    /// One scan-and-dispatch cycle. Returns the number of mailings
    /// dispatched; 0 both when nothing was due and when the lock was
    /// held elsewhere, so callers must not read 0 as "no mailings due".
    pub async fn tick(&self) -> Result<usize> {
        let ttl = Duration::seconds(self.config.lock_ttl_secs);
        if !self.lock.try_acquire(&self.config.lock_key, ttl).await? {
            debug!("scheduler lock held elsewhere, skipping tick");
            return Ok(0);
        }

        let result = self.dispatch_due().await;

        // Released on success and failure alike; a leaked lock would
        // silence the scheduler until the TTL lapses.
        if let Err(e) = self.lock.release(&self.config.lock_key).await {
            warn!(error = %e, "failed to release scheduler lock");
        }

        result
    }

    async fn dispatch_due(&self) -> Result<usize> {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(self.config.min_repeat_minutes);

        // Snapshot at poll time; mailings becoming due mid-tick wait for
        // the next tick.
        let due = self.mailings.find_due(now, cutoff).await?;
        if due.is_empty() {
            return Ok(0);
        }

        debug!(count = due.len(), "due mailings found");

        let mut processed = 0usize;
        for mailing in due {
            match self
                .dispatcher
                .send(&mailing, Some(&mailing.owner), false)
                .await
            {
                Ok(outcome) => {
                    info!(
                        mailing_id = %mailing.id,
                        total = outcome.total,
                        sent = outcome.sent,
                        skipped = outcome.skipped,
                        "scheduled dispatch complete"
                    );
                    processed += 1;
                }
                Err(e) => {
                    // No explicit retry: the mailing stays due (modulo
                    // cooldown) and is picked up on a later tick.
                    error!(mailing_id = %mailing.id, error = %e, "scheduled dispatch failed");
                }
            }

            self.refresh_status(mailing.id).await?;
        }

        Ok(processed)
    }

    async fn refresh_status(&self, id: mailwave_common::types::MailingId) -> Result<()> {
        // Reload: the dispatcher may have stamped last_sent_at.
        if let Some(mailing) = self.mailings.get(id).await? {
            let derived = compute_status(
                self.clock.now(),
                mailing.start_at,
                mailing.end_at,
                mailing.has_ever_sent(),
            );
            if derived != mailing.status() {
                self.mailings.update_status(id, derived).await?;
            }
        }
        Ok(())
    }

    /// Run the poll loop until `shutdown` flips to true. Stops within
    /// one tick; the lock never outlives a tick, so a clean stop holds
    /// nothing.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(StdDuration::from_secs(self.config.poll_interval_secs));

        info!(
            interval_secs = self.config.poll_interval_secs,
            cooldown_minutes = self.config.min_repeat_minutes,
            "due-mailing scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(0) => {}
                        Ok(processed) => info!(processed, "scheduler tick complete"),
                        Err(e) => error!(error = %e, "scheduler tick failed"),
                    }
                }
                changed = shutdown.changed() => {
                    // Err means the sender side is gone; treat it as a stop
                    // rather than spinning on a closed channel.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("due-mailing scheduler stopping");
                        break;
                    }
                }
            }
        }
    }
}
