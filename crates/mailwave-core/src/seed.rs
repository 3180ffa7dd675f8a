//! Demo data seeding
//!
//! Populates a deployment with a small recipient set, one message and
//! one mailing whose window is open, going through the same validation
//! paths as real input. Safe to run repeatedly: existing recipients are
//! reused by email, each run only adds a fresh mailing.

use crate::clock::Clock;
use crate::mailings::MailingService;
use chrono::Duration;
use mailwave_common::types::{MailingId, MessageId, RecipientId};
use mailwave_common::Result;
use mailwave_storage::models::{CreateMailing, CreateMessage, CreateRecipient};
use mailwave_storage::repository::messages::MessageRepository;
use mailwave_storage::repository::recipients::RecipientRepository;
use tracing::info;

const DEMO_RECIPIENTS: &[(&str, &str)] = &[
    ("alice@example.com", "Alice Aldrin"),
    ("bob@example.com", "Bob Borisov"),
    ("carol@example.com", "Carol Chen"),
];

const DEMO_SUBJECT: &str = "Welcome to Mailwave";
const DEMO_BODY: &str = "This mailing was created by the demo seeder.";

/// What one seeding run produced
#[derive(Debug, Clone)]
pub struct SeedOutcome {
    pub recipient_ids: Vec<RecipientId>,
    pub message_id: MessageId,
    pub mailing_id: MailingId,
}

/// Seed demo data for `owner`: three recipients, a message, and a
/// mailing open from now for one hour.
pub async fn seed_demo(
    recipients: &dyn RecipientRepository,
    messages: &dyn MessageRepository,
    mailings: &MailingService,
    clock: &dyn Clock,
    owner: &str,
) -> Result<SeedOutcome> {
    let mut recipient_ids = Vec::with_capacity(DEMO_RECIPIENTS.len());
    for (email, full_name) in DEMO_RECIPIENTS {
        let recipient = match recipients.get_by_email(email).await? {
            Some(existing) => existing,
            None => {
                recipients
                    .create(CreateRecipient {
                        owner: owner.to_string(),
                        email: email.to_string(),
                        full_name: full_name.to_string(),
                        comment: "demo data".to_string(),
                    })
                    .await?
            }
        };
        recipient_ids.push(recipient.id);
    }

    let message = messages
        .create(CreateMessage {
            owner: owner.to_string(),
            subject: DEMO_SUBJECT.to_string(),
            body: DEMO_BODY.to_string(),
        })
        .await?;

    let now = clock.now();
    let mailing = mailings
        .create(CreateMailing {
            owner: owner.to_string(),
            start_at: now,
            end_at: now + Duration::hours(1),
            message_id: message.id,
            recipient_ids: recipient_ids.clone(),
        })
        .await?;

    info!(
        owner,
        mailing_id = %mailing.id,
        recipients = recipient_ids.len(),
        "demo data seeded"
    );

    Ok(SeedOutcome {
        recipient_ids,
        message_id: message.id,
        mailing_id: mailing.id,
    })
}
