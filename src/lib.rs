pub mod email;

#[cfg(test)]
mod test_support;

pub use email::{
  EmailConfig, EmailMessage, EmailSender, LettreTransport, MailTransport, PlainAuth, SmtpEmailSender, TransportError,
};
