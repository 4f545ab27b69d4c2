use std::error::Error;

use async_trait::async_trait;

use super::{
  transport::{LettreTransport, MailTransport},
  types::{EmailConfig, EmailMessage, PlainAuth},
};

#[async_trait]
pub trait EmailSender: Send + Sync {
  type Error: Error + Send + Sync + 'static;

  /// Sends `body` as-is to every address in `to`.
  async fn send(&self, to: &[String], body: &[u8]) -> Result<(), Self::Error>;
}

/// Sends mail through the SMTP server described by an [`EmailConfig`].
///
/// Every call builds the server address and `PLAIN` credentials from the configuration
/// and hands them to the transport exactly once. Transport errors are returned untouched.
pub struct SmtpEmailSender<T = LettreTransport> {
  config: EmailConfig,
  transport: T,
}

impl SmtpEmailSender<LettreTransport> {
  pub fn new(config: EmailConfig) -> Self {
    Self::with_transport(config, LettreTransport)
  }
}

impl<T: MailTransport> SmtpEmailSender<T> {
  pub fn with_transport(config: EmailConfig, transport: T) -> Self {
    SmtpEmailSender { config, transport }
  }

  pub fn config(&self) -> &EmailConfig {
    &self.config
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub async fn send_message(&self, message: &EmailMessage) -> anyhow::Result<()> {
    let body = message.format(&self.config.sender_addr)?;
    let to = message.envelope_recipients()?;
    self.send(&to, &body).await?;
    Ok(())
  }
}

#[async_trait]
impl<T: MailTransport> EmailSender for SmtpEmailSender<T> {
  type Error = T::Error;

  async fn send(&self, to: &[String], body: &[u8]) -> Result<(), T::Error> {
    let addr = self.config.server_addr();
    let auth = PlainAuth::new(&self.config.username, &self.config.password, &self.config.server_host);

    tracing::debug!("Sending email via {} to {} recipient(s)", addr, to.len());

    let result = self
      .transport
      .send_mail(&addr, &auth, &self.config.sender_addr, to, body)
      .await;

    if let Err(e) = &result {
      tracing::warn!("Failed to send email via {}: {}", addr, e);
    }

    result
  }
}
