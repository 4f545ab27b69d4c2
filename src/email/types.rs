use std::{env, fmt};

use anyhow::{Context, Result};
use lettre::{
  message::{header::ContentType, Mailbox},
  Message,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Deserialize)]
pub struct EmailConfig {
  pub username: String,
  pub password: String,
  pub server_host: String,
  pub server_port: String,
  pub sender_addr: String,
}

impl EmailConfig {
  /// `host:port` of the SMTP server, exactly as configured.
  pub fn server_addr(&self) -> String {
    format!("{}:{}", self.server_host, self.server_port)
  }

  /// Reads the configuration from `SMTP_*` environment variables.
  ///
  /// `SMTP_HOST` and `SMTP_PORT` fall back to the defaults; `SMTP_USERNAME`,
  /// `SMTP_PASSWORD` and `SMTP_FROM_EMAIL` are required.
  pub fn from_env() -> Result<Self> {
    let defaults = EmailConfig::default();

    Ok(EmailConfig {
      server_host: env::var("SMTP_HOST").unwrap_or(defaults.server_host),
      server_port: env::var("SMTP_PORT").unwrap_or(defaults.server_port),
      username: env::var("SMTP_USERNAME").context("SMTP_USERNAME not set")?,
      password: env::var("SMTP_PASSWORD").context("SMTP_PASSWORD not set")?,
      sender_addr: env::var("SMTP_FROM_EMAIL").context("SMTP_FROM_EMAIL not set")?,
    })
  }

  /// Same as [`EmailConfig::from_env`], after loading a `.env` file if one exists.
  pub fn load() -> Result<Self> {
    dotenvy::dotenv().ok();
    Self::from_env()
  }
}

impl Default for EmailConfig {
  fn default() -> Self {
    EmailConfig {
      username: "".to_string(),
      password: "".to_string(),
      server_host: "smtp.gmail.com".to_string(),
      server_port: "587".to_string(),
      sender_addr: "".to_string(),
    }
  }
}

impl fmt::Debug for EmailConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EmailConfig")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("server_host", &self.server_host)
      .field("server_port", &self.server_port)
      .field("sender_addr", &self.sender_addr)
      .finish()
  }
}

/// Credentials for the SMTP `PLAIN` mechanism, bound to the host they were issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainAuth {
  pub username: String,
  pub password: String,
  pub host: String,
}

impl PlainAuth {
  pub fn new(username: impl Into<String>, password: impl Into<String>, host: impl Into<String>) -> Self {
    PlainAuth {
      username: username.into(),
      password: password.into(),
      host: host.into(),
    }
  }
}

impl fmt::Debug for PlainAuth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PlainAuth")
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("host", &self.host)
      .finish()
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
  pub to: Vec<String>,
  pub subject: String,
  pub body: String,
}

impl EmailMessage {
  pub fn new(to: Vec<String>, subject: String, body: String) -> Self {
    EmailMessage { to, subject, body }
  }

  /// Bare addresses of the recipients, with any display names stripped.
  pub fn envelope_recipients(&self) -> Result<Vec<String>> {
    self
      .to
      .iter()
      .map(|recipient| {
        let mailbox: Mailbox = recipient
          .parse()
          .with_context(|| format!("Invalid recipient address: {}", recipient))?;
        Ok::<_, anyhow::Error>(mailbox.email.to_string())
      })
      .collect()
  }

  /// Renders a plain-text RFC 5322 message (headers and body) sent from `from`.
  pub fn format(&self, from: &str) -> Result<Vec<u8>> {
    let from: Mailbox = from
      .parse()
      .with_context(|| format!("Invalid sender address: {}", from))?;

    let mut builder = Message::builder().from(from);
    for recipient in &self.to {
      let mailbox: Mailbox = recipient
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", recipient))?;
      builder = builder.to(mailbox);
    }

    let message = builder
      .subject(self.subject.as_str())
      .header(ContentType::TEXT_PLAIN)
      .body(self.body.clone())
      .context("Failed to build email")?;

    Ok(message.formatted())
  }
}
