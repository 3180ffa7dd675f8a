//! Common types for Mailwave

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for recipients
pub type RecipientId = Uuid;

/// Unique identifier for message templates
pub type MessageId = Uuid;

/// Unique identifier for mailings
pub type MailingId = Uuid;

/// Unique identifier for mailing logs
pub type MailingLogId = Uuid;

/// Unique identifier for mailing attempts
pub type MailingAttemptId = Uuid;

/// Email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address from a string, normalizing whitespace and case
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        let parts: Vec<&str> = s.splitn(2, '@').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            Some(Self::new(parts[0], parts[1]))
        } else {
            None
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

/// Normalize an email string the way the storage layer stores it:
/// trimmed and lowercased.
pub fn normalize_email(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}
