//! Email delivery over SMTP.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
#[cfg(test)]
use mockall::automock;

use crate::config::SmtpConfig;

use super::error::NotificationError;

/// Sends one plain-text email. Seam between the dispatch logic and the
/// SMTP transport so delivery can be faked in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MailSender: Send + Sync {
    /// Delivers one message to one recipient.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError>;
}

/// [`MailSender`] backed by an async SMTP relay with STARTTLS.
pub struct SmtpMailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailSender {
    /// Builds the transport from the app's SMTP settings.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotificationError> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|e| NotificationError::ConfigError(format!("Invalid from address: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl MailSender for SmtpMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        Ok(())
    }
}
