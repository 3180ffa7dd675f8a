//! Mailwave Core - Mailing lifecycle and dispatch engine
//!
//! This crate provides the core of Mailwave: status derivation from a
//! mailing's time window and send history, the per-recipient dispatch
//! loop with its log/attempt bookkeeping, the due-mailing scheduler,
//! and reporting rollups.

pub mod clock;
pub mod dispatch;
pub mod mailings;
pub mod reports;
pub mod scheduler;
pub mod seed;
pub mod status;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock};
pub use dispatch::{Dispatcher, SendOutcome};
pub use mailings::MailingService;
pub use reports::ReportService;
pub use scheduler::DueMailingScheduler;
pub use seed::{seed_demo, SeedOutcome};
pub use status::{compute_status, validate_window};
pub use transport::{SmtpMailer, Transport};
