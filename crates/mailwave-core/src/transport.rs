//! Delivery transport abstraction
//!
//! The dispatch engine only ever calls `deliver`; email is the one
//! implementation today, but the seam is channel-agnostic so an SMS or
//! webhook transport can be added without touching the send loop.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use mailwave_common::config::SmtpConfig;
use mailwave_common::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// A capability to deliver one message to one address.
///
/// Returns the number of recipients the transport accepted; zero is a
/// distinguishable soft failure, a transport error is a hard one.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, subject: &str, body: &str, from: &str, to: &str) -> Result<u32>;
}

/// SMTP transport backed by lettre
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the mailer from configuration. The per-send timeout bounds
    /// how long a hung connection can stall a batch.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| Error::Transport(format!("Failed to create SMTP transport: {}", e)))?
        } else if config.use_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| Error::Transport(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let mailer = builder
            .timeout(Some(Duration::from_secs(config.timeout_secs)))
            .build();

        Ok(Self { mailer })
    }
}

#[async_trait]
impl Transport for SmtpMailer {
    async fn deliver(&self, subject: &str, body: &str, from: &str, to: &str) -> Result<u32> {
        let from: Mailbox = from
            .parse()
            .map_err(|e| Error::Transport(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| Error::Transport(format!("Invalid to address: {}", e)))?;

        let email = lettre::Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Transport(format!("Failed to build email: {}", e)))?;

        let response = self
            .mailer
            .send(email)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if !response.is_positive() {
            warn!(code = %response.code(), "SMTP did not accept message");
            return Ok(0);
        }

        debug!(code = %response.code(), "SMTP accepted message");
        Ok(1)
    }
}
