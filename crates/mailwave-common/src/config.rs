//! Configuration for Mailwave

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// SMTP configuration
    #[serde(default)]
    pub smtp: SmtpConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Reporting configuration
    #[serde(default)]
    pub reporting: ReportingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (PostgreSQL)
    pub url: String,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// SMTP configuration for outbound delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// SMTP relay host
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTP relay port
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// Optional SMTP username
    pub username: Option<String>,

    /// Optional SMTP password
    pub password: Option<String>,

    /// Use implicit TLS
    #[serde(default)]
    pub use_tls: bool,

    /// Use STARTTLS
    #[serde(default = "default_true")]
    pub use_starttls: bool,

    /// Envelope/From address for outgoing mail
    #[serde(default = "default_from_address")]
    pub from_address: String,

    /// Per-send timeout in seconds
    #[serde(default = "default_send_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            use_tls: false,
            use_starttls: true,
            from_address: default_from_address(),
            timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_true() -> bool {
    true
}

fn default_from_address() -> String {
    "no-reply@example.com".to_string()
}

fn default_send_timeout_secs() -> u64 {
    30
}

/// Due-mailing scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between polls for due mailings
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Cooldown in minutes before a mailing may be re-dispatched
    #[serde(default = "default_min_repeat_minutes")]
    pub min_repeat_minutes: i64,

    /// TTL of the scheduler mutual-exclusion lock, in seconds.
    /// Must stay below the poll interval so a crashed holder
    /// cannot block more than one tick.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: i64,

    /// Name of the scheduler lock
    #[serde(default = "default_lock_key")]
    pub lock_key: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            min_repeat_minutes: default_min_repeat_minutes(),
            lock_ttl_secs: default_lock_ttl_secs(),
            lock_key: default_lock_key(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_min_repeat_minutes() -> i64 {
    5
}

fn default_lock_ttl_secs() -> i64 {
    55
}

fn default_lock_key() -> String {
    "mailwave:scheduler:lock".to_string()
}

/// Reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// TTL of cached stats rollups, in seconds
    #[serde(default = "default_stats_cache_ttl_secs")]
    pub stats_cache_ttl_secs: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            stats_cache_ttl_secs: default_stats_cache_ttl_secs(),
        }
    }
}

fn default_stats_cache_ttl_secs() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load configuration from the default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./mailwave.toml"),
            std::path::PathBuf::from("/etc/mailwave/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}
