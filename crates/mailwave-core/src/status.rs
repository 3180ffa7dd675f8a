//! Mailing status derivation
//!
//! Status is a pure function of the current time, the mailing's window
//! and whether it has ever really sent. The stored column is a cached
//! copy for indexed filtering; callers recompute before trusting it.

use chrono::{DateTime, Utc};
use mailwave_common::{Error, Result};
use mailwave_storage::models::MailingStatus;

/// Derive the status of a mailing at `now`.
///
/// Finished is terminal in practice: once `now >= end_at` every later
/// evaluation also yields Finished.
pub fn compute_status(
    now: DateTime<Utc>,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    has_ever_sent: bool,
) -> MailingStatus {
    if now >= end_at {
        MailingStatus::Finished
    } else if has_ever_sent || (start_at <= now && now < end_at) {
        MailingStatus::Running
    } else {
        MailingStatus::Created
    }
}

/// Validate a mailing's time window on a full save path.
///
/// `creating` additionally rejects a window already fully in the past:
/// you cannot create a mailing that could never run.
pub fn validate_window(
    now: DateTime<Utc>,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    creating: bool,
) -> Result<()> {
    if end_at <= start_at {
        return Err(Error::validation("end_at", "must be after start_at"));
    }
    if creating && end_at <= now {
        return Err(Error::validation("end_at", "must be in the future"));
    }
    Ok(())
}
