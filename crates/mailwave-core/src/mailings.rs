//! Mailing lifecycle service
//!
//! Every full save path validates the time window and recomputes the
//! persisted status, so the stored column never drifts from what
//! `compute_status` would derive.

use crate::clock::Clock;
use crate::status::{compute_status, validate_window};
use chrono::{DateTime, Utc};
use mailwave_common::types::MailingId;
use mailwave_common::{Error, Result};
use mailwave_storage::models::{CreateMailing, Mailing, MailingStatus};
use mailwave_storage::repository::mailings::MailingRepository;
use mailwave_storage::repository::messages::MessageRepository;
use std::sync::Arc;
use tracing::info;

/// Mailing lifecycle service
pub struct MailingService {
    mailings: Arc<dyn MailingRepository>,
    messages: Arc<dyn MessageRepository>,
    clock: Arc<dyn Clock>,
}

impl MailingService {
    pub fn new(
        mailings: Arc<dyn MailingRepository>,
        messages: Arc<dyn MessageRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mailings,
            messages,
            clock,
        }
    }

    /// Create a mailing. Rejects inverted windows, windows already in
    /// the past, unknown message references and empty recipient sets.
    pub async fn create(&self, input: CreateMailing) -> Result<Mailing> {
        let now = self.clock.now();
        validate_window(now, input.start_at, input.end_at, true)?;

        if input.recipient_ids.is_empty() {
            return Err(Error::validation(
                "recipients",
                "select at least one recipient",
            ));
        }

        self.messages
            .get(input.message_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("message {}", input.message_id)))?;

        let status = compute_status(now, input.start_at, input.end_at, false);
        let mailing = self.mailings.create(input, status).await?;

        info!(mailing_id = %mailing.id, status = %mailing.status, "mailing created");
        Ok(mailing)
    }

    /// Edit the time window of an existing mailing, revalidating and
    /// recomputing the status on the way.
    pub async fn update_window(
        &self,
        id: MailingId,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Mailing> {
        let mailing = self
            .mailings
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mailing {}", id)))?;

        let now = self.clock.now();
        validate_window(now, start_at, end_at, false)?;

        let status = compute_status(now, start_at, end_at, mailing.has_ever_sent());
        self.mailings
            .update_window(id, start_at, end_at, status)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mailing {}", id)))
    }

    /// Recompute the status from "now" and persist it (status column
    /// only) when it changed. Returns the derived status either way.
    pub async fn refresh_status(&self, mailing: &Mailing) -> Result<MailingStatus> {
        let derived = compute_status(
            self.clock.now(),
            mailing.start_at,
            mailing.end_at,
            mailing.has_ever_sent(),
        );
        if derived != mailing.status() {
            self.mailings.update_status(mailing.id, derived).await?;
        }
        Ok(derived)
    }

    /// Administrative finish: stop a mailing regardless of its window
    pub async fn force_finish(&self, id: MailingId) -> Result<()> {
        self.mailings
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("mailing {}", id)))?;

        self.mailings
            .update_status(id, MailingStatus::Finished)
            .await?;
        info!(mailing_id = %id, "mailing force-finished");
        Ok(())
    }

    /// Delete a mailing, refusing those with real send history (their
    /// logs and attempts are audit history).
    pub async fn delete(&self, id: MailingId) -> Result<()> {
        if !self.mailings.delete_unsent(id).await? {
            return Err(Error::NotFound(format!("mailing {}", id)));
        }
        info!(mailing_id = %id, "mailing deleted");
        Ok(())
    }
}
