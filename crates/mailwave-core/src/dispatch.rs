//! Dispatch engine - the per-mailing send loop
//!
//! One invocation attempts delivery to every recipient of one mailing,
//! writes one log row per recipient plus one aggregate attempt row, and
//! never lets a single recipient's failure abort the batch.

use crate::clock::Clock;
use crate::status::compute_status;
use crate::transport::Transport;
use mailwave_common::types::MailingId;
use mailwave_common::{Error, Result};
use mailwave_storage::models::{
    AttemptStatus, CreateMailingLog, LogStatus, Mailing, MailingAttempt, Message,
};
use mailwave_storage::repository::attempts::MailingAttemptRepository;
use mailwave_storage::repository::logs::MailingLogRepository;
use mailwave_storage::repository::mailings::MailingRepository;
use mailwave_storage::repository::messages::MessageRepository;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Aggregated result of one dispatch invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOutcome {
    /// Recipients with a non-empty email
    pub total: usize,
    /// Really delivered
    pub sent: usize,
    /// Skipped, failed, or dry-run
    pub skipped: usize,
}

/// Dispatch engine
pub struct Dispatcher {
    mailings: Arc<dyn MailingRepository>,
    messages: Arc<dyn MessageRepository>,
    logs: Arc<dyn MailingLogRepository>,
    attempts: Arc<dyn MailingAttemptRepository>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    from_address: String,
}

impl Dispatcher {
    pub fn new(
        mailings: Arc<dyn MailingRepository>,
        messages: Arc<dyn MessageRepository>,
        logs: Arc<dyn MailingLogRepository>,
        attempts: Arc<dyn MailingAttemptRepository>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        from_address: String,
    ) -> Self {
        Self {
            mailings,
            messages,
            logs,
            attempts,
            transport,
            clock,
            from_address,
        }
    }

    /// Send a mailing by id. A missing id is a distinct NotFound error,
    /// never conflated with a delivery failure.
    pub async fn send_by_id(
        &self,
        id: MailingId,
        actor: Option<&str>,
        dry_run: bool,
    ) -> Result<SendOutcome> {
        let mailing = self
            .mailings
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mailing {}", id)))?;
        self.send(&mailing, actor, dry_run).await
    }

    /// Attempt delivery to every recipient of `mailing`.
    ///
    /// Per-recipient failures are logged and counted, never raised. The
    /// only raising path is a whole-batch fatal error (log or attempt
    /// rows unwritable), which finalizes the attempt as `fail` before
    /// propagating.
    pub async fn send(
        &self,
        mailing: &Mailing,
        actor: Option<&str>,
        dry_run: bool,
    ) -> Result<SendOutcome> {
        let started = Instant::now();

        // Snapshot the recipient set at call time; blank emails are
        // silently excluded from the count.
        let recipients: Vec<String> = self
            .mailings
            .recipients(mailing.id)
            .await?
            .into_iter()
            .map(|r| r.email)
            .filter(|e| !e.is_empty())
            .collect();
        let total = recipients.len();

        let message = self
            .messages
            .get(mailing.message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {}", mailing.message_id)))?;

        info!(
            mailing_id = %mailing.id,
            dry_run,
            total,
            subject = %message.subject,
            actor = actor.unwrap_or("-"),
            "dispatch started"
        );

        // Placeholder attempt row first: if the process dies mid-run the
        // row stays in a visibly incomplete state.
        let attempt = self.attempts.open(mailing.id, actor).await?;
        debug!(attempt_id = %attempt.id, mailing_id = %mailing.id, "attempt opened");

        match self
            .run_batch(mailing, &message, &recipients, &attempt, actor, dry_run)
            .await
        {
            Ok(outcome) => {
                info!(
                    mailing_id = %mailing.id,
                    dry_run,
                    duration_ms = started.elapsed().as_millis() as u64,
                    total = outcome.total,
                    sent = outcome.sent,
                    skipped = outcome.skipped,
                    "dispatch done"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(mailing_id = %mailing.id, error = %e, "dispatch fatal error");
                if let Err(save_err) = self
                    .attempts
                    .finalize(attempt.id, AttemptStatus::Fail, "fatal error during dispatch")
                    .await
                {
                    error!(
                        attempt_id = %attempt.id,
                        error = %save_err,
                        "failed to finalize attempt after fatal error"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_batch(
        &self,
        mailing: &Mailing,
        message: &Message,
        recipients: &[String],
        attempt: &MailingAttempt,
        actor: Option<&str>,
        dry_run: bool,
    ) -> Result<SendOutcome> {
        let total = recipients.len();
        let mut sent = 0usize;
        let mut skipped = 0usize;

        for email in recipients {
            if dry_run {
                self.log(mailing.id, email, LogStatus::DryRun, "not delivered (dry run)", actor)
                    .await?;
                skipped += 1;
                debug!(mailing_id = %mailing.id, to = %email, "dry-run skip");
                continue;
            }

            match self
                .transport
                .deliver(&message.subject, &message.body, &self.from_address, email)
                .await
            {
                Ok(accepted) if accepted > 0 => {
                    sent += 1;
                    self.log(mailing.id, email, LogStatus::Sent, "delivered via transport", actor)
                        .await?;
                    debug!(mailing_id = %mailing.id, to = %email, "sent");
                }
                Ok(_) => {
                    skipped += 1;
                    self.log(
                        mailing.id,
                        email,
                        LogStatus::Error,
                        "transport accepted 0 recipients",
                        actor,
                    )
                    .await?;
                    warn!(mailing_id = %mailing.id, to = %email, "transport accepted 0 recipients");
                }
                Err(e) => {
                    // Isolated to this recipient; the loop continues.
                    skipped += 1;
                    self.log(
                        mailing.id,
                        email,
                        LogStatus::Error,
                        &format!("send failed: {}", e),
                        actor,
                    )
                    .await?;
                    warn!(mailing_id = %mailing.id, to = %email, error = %e, "send failed");
                }
            }
        }

        let (status, response) = if dry_run {
            (
                AttemptStatus::Success,
                format!("dry-run; total={}; skipped={}", total, skipped),
            )
        } else if sent > 0 {
            // First real success stamps last_sent_at and refreshes the
            // persisted status.
            let now = self.clock.now();
            let new_status = compute_status(now, mailing.start_at, mailing.end_at, true);
            self.mailings.mark_sent(mailing.id, now, new_status).await?;
            (
                AttemptStatus::Success,
                format!("sent={}; skipped={}", sent, skipped),
            )
        } else {
            (
                AttemptStatus::Fail,
                format!("no real sends; skipped={}", skipped),
            )
        };

        self.attempts
            .finalize(attempt.id, status, &response)
            .await?;
        debug!(attempt_id = %attempt.id, status = %status, response = %response, "attempt finalized");

        Ok(SendOutcome {
            total,
            sent,
            skipped,
        })
    }

    async fn log(
        &self,
        mailing_id: MailingId,
        recipient: &str,
        status: LogStatus,
        detail: &str,
        actor: Option<&str>,
    ) -> Result<()> {
        self.logs
            .create(CreateMailingLog {
                mailing_id,
                recipient: recipient.to_string(),
                status,
                detail: detail.to_string(),
                triggered_by: actor.map(|a| a.to_string()),
            })
            .await?;
        Ok(())
    }
}
