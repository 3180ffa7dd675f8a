//! Data models for Mailwave

use chrono::{DateTime, Utc};
use mailwave_common::types::{MailingId, MessageId, RecipientId};
use mailwave_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Mailing lifecycle status. Derived from the time window and send
/// history (see `mailwave-core::status`), persisted for indexed filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailingStatus {
    Created,
    Running,
    Finished,
}

impl std::fmt::Display for MailingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailingStatus::Created => write!(f, "created"),
            MailingStatus::Running => write!(f, "running"),
            MailingStatus::Finished => write!(f, "finished"),
        }
    }
}

impl std::str::FromStr for MailingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "created" => Ok(MailingStatus::Created),
            "running" => Ok(MailingStatus::Running),
            "finished" => Ok(MailingStatus::Finished),
            other => Err(format!("Unknown mailing status: {}", other)),
        }
    }
}

/// Outcome recorded per recipient in a mailing log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    Sent,
    Error,
    Skipped,
    DryRun,
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogStatus::Sent => write!(f, "sent"),
            LogStatus::Error => write!(f, "error"),
            LogStatus::Skipped => write!(f, "skipped"),
            LogStatus::DryRun => write!(f, "dry_run"),
        }
    }
}

impl std::str::FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sent" => Ok(LogStatus::Sent),
            "error" => Ok(LogStatus::Error),
            "skipped" => Ok(LogStatus::Skipped),
            "dry_run" => Ok(LogStatus::DryRun),
            other => Err(format!("Unknown log status: {}", other)),
        }
    }
}

/// Aggregate outcome of one dispatch invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Success,
    Fail,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Success => write!(f, "success"),
            AttemptStatus::Fail => write!(f, "fail"),
        }
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "success" => Ok(AttemptStatus::Success),
            "fail" => Ok(AttemptStatus::Fail),
            other => Err(format!("Unknown attempt status: {}", other)),
        }
    }
}

/// A mailing recipient
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub owner: String,
    pub email: String,
    pub full_name: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a recipient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecipient {
    pub owner: String,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub comment: String,
}

impl CreateRecipient {
    /// Validate and normalize the input: email trimmed and lowercased,
    /// name trimmed, minimum name length of 2.
    pub fn normalized(mut self) -> Result<Self> {
        self.email = mailwave_common::types::normalize_email(&self.email);
        self.full_name = self.full_name.trim().to_string();

        if mailwave_common::types::EmailAddress::parse(&self.email).is_none() {
            return Err(Error::validation("email", "not a valid email address"));
        }
        if self.full_name.chars().count() < 2 {
            return Err(Error::validation("full_name", "must be at least 2 characters"));
        }
        Ok(self)
    }
}

/// A message template (subject + body)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub owner: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessage {
    pub owner: String,
    pub subject: String,
    pub body: String,
}

impl CreateMessage {
    /// Validate and normalize the input: subject must be non-empty after trim.
    pub fn normalized(mut self) -> Result<Self> {
        self.subject = self.subject.trim().to_string();
        if self.subject.is_empty() {
            return Err(Error::validation("subject", "must not be empty"));
        }
        Ok(self)
    }
}

/// A mailing: a scheduled send of one message to a set of recipients
/// over a time window
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Mailing {
    pub id: MailingId,
    pub owner: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: String,
    pub message_id: MessageId,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mailing {
    /// Whether at least one real (non-dry-run) send succeeded
    pub fn has_ever_sent(&self) -> bool {
        self.last_sent_at.is_some()
    }

    /// Parsed status
    pub fn status(&self) -> MailingStatus {
        self.status.parse().unwrap_or(MailingStatus::Created)
    }
}

/// Input for creating a mailing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMailing {
    pub owner: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub message_id: MessageId,
    pub recipient_ids: Vec<RecipientId>,
}

/// One per-recipient outcome within one dispatch invocation.
/// Append-only; never updated after creation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MailingLog {
    pub id: uuid::Uuid,
    pub mailing_id: MailingId,
    pub recipient: String,
    pub status: String,
    pub detail: String,
    pub triggered_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a mailing log row
#[derive(Debug, Clone)]
pub struct CreateMailingLog {
    pub mailing_id: MailingId,
    pub recipient: String,
    pub status: LogStatus,
    pub detail: String,
    pub triggered_by: Option<String>,
}

/// One aggregate record per dispatch invocation against one mailing.
/// Created as `fail`/"attempt started" at the start of a run and
/// finalized once at the end of the same run.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MailingAttempt {
    pub id: uuid::Uuid,
    pub mailing_id: MailingId,
    pub status: String,
    pub server_response: String,
    pub triggered_by: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Read-only rollup over a mailing's log and attempt history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailingStats {
    pub sent: i64,
    pub failed: i64,
    pub dry_run: i64,
    pub attempt_success: i64,
    pub attempt_fail: i64,
}

impl MailingStats {
    /// Merge another rollup into this one (owner-level summaries)
    pub fn merge(&mut self, other: &MailingStats) {
        self.sent += other.sent;
        self.failed += other.failed;
        self.dry_run += other.dry_run;
        self.attempt_success += other.attempt_success;
        self.attempt_fail += other.attempt_fail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            MailingStatus::Created,
            MailingStatus::Running,
            MailingStatus::Finished,
        ] {
            assert_eq!(status.to_string().parse::<MailingStatus>().unwrap(), status);
        }
        assert!("запущена".parse::<MailingStatus>().is_err());
    }

    #[test]
    fn test_log_status_roundtrip() {
        for status in [
            LogStatus::Sent,
            LogStatus::Error,
            LogStatus::Skipped,
            LogStatus::DryRun,
        ] {
            assert_eq!(status.to_string().parse::<LogStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_create_recipient_normalizes() {
        let input = CreateRecipient {
            owner: "admin@example.com".to_string(),
            email: "  Jane.Doe@Example.COM ".to_string(),
            full_name: "  Jane Doe ".to_string(),
            comment: String::new(),
        }
        .normalized()
        .unwrap();

        assert_eq!(input.email, "jane.doe@example.com");
        assert_eq!(input.full_name, "Jane Doe");
    }

    #[test]
    fn test_create_recipient_rejects_bad_email() {
        let err = CreateRecipient {
            owner: "admin@example.com".to_string(),
            email: "not-an-email".to_string(),
            full_name: "Jane Doe".to_string(),
            comment: String::new(),
        }
        .normalized()
        .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_create_recipient_rejects_short_name() {
        let err = CreateRecipient {
            owner: "admin@example.com".to_string(),
            email: "jane@example.com".to_string(),
            full_name: "J".to_string(),
            comment: String::new(),
        }
        .normalized()
        .unwrap_err();

        assert!(matches!(err, Error::Validation { ref field, .. } if field == "full_name"));
    }

    #[test]
    fn test_create_message_rejects_blank_subject() {
        let err = CreateMessage {
            owner: "admin@example.com".to_string(),
            subject: "   ".to_string(),
            body: "Body".to_string(),
        }
        .normalized()
        .unwrap_err();

        assert!(matches!(err, Error::Validation { ref field, .. } if field == "subject"));
    }

    #[test]
    fn test_stats_merge() {
        let mut a = MailingStats {
            sent: 2,
            failed: 1,
            dry_run: 0,
            attempt_success: 1,
            attempt_fail: 0,
        };
        a.merge(&MailingStats {
            sent: 3,
            failed: 0,
            dry_run: 5,
            attempt_success: 1,
            attempt_fail: 2,
        });
        assert_eq!(a.sent, 5);
        assert_eq!(a.failed, 1);
        assert_eq!(a.dry_run, 5);
        assert_eq!(a.attempt_success, 2);
        assert_eq!(a.attempt_fail, 2);
    }
}
