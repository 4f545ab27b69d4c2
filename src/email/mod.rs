//! Email sending functionality module
//!
//! [`SmtpEmailSender`] turns an [`EmailConfig`] into a server address and `PLAIN`
//! credentials and hands the message to a [`MailTransport`]. Production code uses
//! [`LettreTransport`], built on lettre; tests inject their own transport.

mod sender;
mod transport;
mod types;

pub use sender::{EmailSender, SmtpEmailSender};
pub use transport::{LettreTransport, MailTransport, TransportError};
pub use types::{EmailConfig, EmailMessage, PlainAuth};
