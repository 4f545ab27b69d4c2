use std::{error::Error, fmt};

use async_trait::async_trait;
use lettre::{
  address::Envelope,
  transport::smtp::{
    self,
    authentication::{Credentials, Mechanism},
    client::{Tls, TlsParameters},
  },
  Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};

use super::types::PlainAuth;

/// The network-facing half of sending an email: deliver `body` to `to` through the
/// SMTP server at `addr`, authenticating with `auth`.
#[async_trait]
pub trait MailTransport: Send + Sync {
  type Error: Error + Send + Sync + 'static;

  async fn send_mail(
    &self,
    addr: &str,
    auth: &PlainAuth,
    from: &str,
    to: &[String],
    body: &[u8],
  ) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub enum TransportError {
  InvalidServerAddress(String),
  HostMismatch { expected: String, actual: String },
  InvalidAddress(String),
  Smtp(smtp::Error),
}

impl Error for TransportError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      TransportError::Smtp(err) => Some(err),
      _ => None,
    }
  }
}

impl fmt::Display for TransportError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TransportError::InvalidServerAddress(msg) => write!(f, "Invalid server address: {}", msg),
      TransportError::HostMismatch { expected, actual } => {
        write!(f, "Wrong host name: credentials for {} offered to {}", expected, actual)
      }
      TransportError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
      TransportError::Smtp(err) => write!(f, "SMTP error: {}", err),
    }
  }
}

impl From<smtp::Error> for TransportError {
  fn from(err: smtp::Error) -> Self {
    TransportError::Smtp(err)
  }
}

/// Delivers mail over a fresh lettre SMTP connection per call.
///
/// `PLAIN` credentials only ever travel over TLS: remote servers must accept STARTTLS or
/// the call fails before authenticating. Loopback hosts are spoken to in the clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct LettreTransport;

#[async_trait]
impl MailTransport for LettreTransport {
  type Error = TransportError;

  async fn send_mail(
    &self,
    addr: &str,
    auth: &PlainAuth,
    from: &str,
    to: &[String],
    body: &[u8],
  ) -> Result<(), TransportError> {
    let (host, port) = split_server_addr(addr)?;

    if auth.host != host {
      return Err(TransportError::HostMismatch {
        expected: auth.host.clone(),
        actual: host.to_string(),
      });
    }

    let envelope = build_envelope(from, to)?;
    let transporter = build_transporter(host, port, auth)?;

    transporter.send_raw(&envelope, body).await?;
    tracing::info!("Email sent via {} to {} recipient(s)", addr, to.len());

    Ok(())
  }
}

fn split_server_addr(addr: &str) -> Result<(&str, u16), TransportError> {
  let (host, port) = addr
    .rsplit_once(':')
    .ok_or_else(|| TransportError::InvalidServerAddress(format!("missing port in {}", addr)))?;

  let host = host.trim_start_matches('[').trim_end_matches(']');
  if host.is_empty() {
    return Err(TransportError::InvalidServerAddress(format!("missing host in {}", addr)));
  }

  let port = port
    .parse::<u16>()
    .map_err(|e| TransportError::InvalidServerAddress(format!("bad port in {}: {}", addr, e)))?;

  Ok((host, port))
}

fn is_local_host(host: &str) -> bool {
  matches!(host, "localhost" | "127.0.0.1" | "::1")
}

fn parse_address(raw: &str) -> Result<Address, TransportError> {
  raw
    .parse()
    .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", raw, e)))
}

fn build_envelope(from: &str, to: &[String]) -> Result<Envelope, TransportError> {
  let from = parse_address(from)?;
  let to = to
    .iter()
    .map(|recipient| parse_address(recipient))
    .collect::<Result<Vec<_>, _>>()?;

  Envelope::new(Some(from), to).map_err(|e| TransportError::InvalidAddress(e.to_string()))
}

fn build_transporter(
  host: &str,
  port: u16,
  auth: &PlainAuth,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
  let tls = if is_local_host(host) {
    Tls::None
  } else {
    Tls::Required(TlsParameters::new(host.to_string())?)
  };

  let creds = Credentials::new(auth.username.clone(), auth.password.clone());

  Ok(
    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
      .port(port)
      .tls(tls)
      .credentials(creds)
      .authentication(vec![Mechanism::Plain])
      .build(),
  )
}
