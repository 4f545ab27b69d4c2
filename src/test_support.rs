use std::{
  error::Error,
  fmt, io,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
};

use async_trait::async_trait;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
  net::{TcpListener, TcpStream},
};

use crate::email::{EmailConfig, MailTransport, PlainAuth};

pub fn sample_config() -> EmailConfig {
  EmailConfig {
    username: "u".to_string(),
    password: "p".to_string(),
    server_host: "smtp.example.com".to_string(),
    server_port: "587".to_string(),
    sender_addr: "from@example.com".to_string(),
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubError(pub String);

impl Error for StubError {}

impl fmt::Display for StubError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Arguments of one transport invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailRecorder {
  pub addr: String,
  pub auth: PlainAuth,
  pub from: String,
  pub to: Vec<String>,
  pub body: Vec<u8>,
}

/// Transport double that remembers its last call and answers with a fixed result.
pub struct RecordingTransport {
  last: Mutex<Option<EmailRecorder>>,
  calls: AtomicUsize,
  result: Result<(), StubError>,
}

impl RecordingTransport {
  pub fn succeeding() -> Self {
    Self::returning(Ok(()))
  }

  pub fn failing(err: StubError) -> Self {
    Self::returning(Err(err))
  }

  fn returning(result: Result<(), StubError>) -> Self {
    RecordingTransport {
      last: Mutex::new(None),
      calls: AtomicUsize::new(0),
      result,
    }
  }

  pub fn last(&self) -> Option<EmailRecorder> {
    self.last.lock().expect("recorder lock poisoned").clone()
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl MailTransport for RecordingTransport {
  type Error = StubError;

  async fn send_mail(
    &self,
    addr: &str,
    auth: &PlainAuth,
    from: &str,
    to: &[String],
    body: &[u8],
  ) -> Result<(), StubError> {
    *self.last.lock().expect("recorder lock poisoned") = Some(EmailRecorder {
      addr: addr.to_string(),
      auth: auth.clone(),
      from: from.to_string(),
      to: to.to_vec(),
      body: body.to_vec(),
    });
    self.calls.fetch_add(1, Ordering::SeqCst);

    self.result.clone()
  }
}

/// SMTP server on a loopback address that accepts every command and records what the
/// client sends. It offers `AUTH PLAIN` and never offers STARTTLS.
pub struct FakeSmtpServer {
  pub port: u16,
  lines: Arc<Mutex<Vec<String>>>,
}

impl FakeSmtpServer {
  pub async fn start(ip: &str) -> Self {
    let listener = TcpListener::bind((ip, 0)).await.expect("bind fake smtp server");
    let port = listener.local_addr().expect("fake smtp server address").port();
    let lines = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&lines);
    tokio::spawn(async move {
      while let Ok((stream, _)) = listener.accept().await {
        tokio::spawn(serve_smtp(stream, Arc::clone(&recorded)));
      }
    });

    FakeSmtpServer { port, lines }
  }

  pub fn lines(&self) -> Vec<String> {
    self.lines.lock().expect("fake smtp lock poisoned").clone()
  }

  pub fn saw_auth(&self) -> bool {
    self
      .lines()
      .iter()
      .any(|line| line.to_ascii_uppercase().starts_with("AUTH"))
  }
}

async fn serve_smtp(stream: TcpStream, recorded: Arc<Mutex<Vec<String>>>) -> io::Result<()> {
  let (reader, mut writer) = stream.into_split();
  let mut lines = BufReader::new(reader).lines();
  let mut in_data = false;

  writer.write_all(b"220 fake.test ESMTP\r\n").await?;

  while let Some(line) = lines.next_line().await? {
    recorded.lock().expect("fake smtp lock poisoned").push(line.clone());

    if in_data {
      if line == "." {
        in_data = false;
        writer.write_all(b"250 2.0.0 Queued\r\n").await?;
      }
      continue;
    }

    let verb = line.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
    let reply: &[u8] = match verb.as_str() {
      "EHLO" => b"250-fake.test\r\n250 AUTH PLAIN\r\n",
      "AUTH" => b"235 2.7.0 Authentication successful\r\n",
      "DATA" => {
        in_data = true;
        b"354 End data with <CR><LF>.<CR><LF>\r\n"
      }
      "QUIT" => {
        writer.write_all(b"221 2.0.0 Bye\r\n").await?;
        return Ok(());
      }
      _ => b"250 2.0.0 OK\r\n",
    };
    writer.write_all(reply).await?;
  }

  Ok(())
}
