//! Repository layer for data access

pub mod attempts;
pub mod locks;
pub mod logs;
pub mod mailings;
pub mod messages;
pub mod recipients;

// Re-export concrete repository implementations with simple names
pub use attempts::DbMailingAttemptRepository as MailingAttemptRepository;
pub use locks::DbLockProvider as LockProvider;
pub use logs::DbMailingLogRepository as MailingLogRepository;
pub use mailings::DbMailingRepository as MailingRepository;
pub use messages::DbMessageRepository as MessageRepository;
pub use recipients::DbRecipientRepository as RecipientRepository;

// Re-export repository traits
pub use attempts::MailingAttemptRepository as MailingAttemptRepositoryTrait;
pub use locks::LockProvider as LockProviderTrait;
pub use logs::MailingLogRepository as MailingLogRepositoryTrait;
pub use mailings::MailingRepository as MailingRepositoryTrait;
pub use messages::MessageRepository as MessageRepositoryTrait;
pub use recipients::RecipientRepository as RecipientRepositoryTrait;

// Re-export rollup types
pub use attempts::AttemptCounts;
pub use logs::LogCounts;
