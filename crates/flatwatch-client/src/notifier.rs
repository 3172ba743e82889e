use std::ffi::OsString;
use std::time::Duration;

use flatwatch_core::error::AppError;
use flatwatch_core::traits::{Mail, Notifier};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSendmailTransport, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

pub const DEFAULT_SENDMAIL: &str = "/usr/sbin/sendmail";

/// Port where SMTP servers expect TLS from the first byte.
const SMTPS_PORT: u16 = 465;

/// How a composed digest leaves the machine.
pub enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Sendmail(AsyncSendmailTransport<Tokio1Executor>),
}

impl MailTransport {
    /// SMTP relay at `server` (`host` or `host:port`).
    ///
    /// Port 465 uses implicit TLS, every other port STARTTLS. Without a port
    /// the submission port 587 is used.
    pub fn smtp(server: &str, login: Option<(&str, &str)>) -> Result<Self, AppError> {
        let (host, port) = match server.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    AppError::ConfigError(format!("invalid SMTP port in '{server}'"))
                })?;
                (host, Some(port))
            }
            None => (server, None),
        };

        let builder = if port == Some(SMTPS_PORT) {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        };
        let builder = builder
            .map_err(|e| AppError::ConfigError(format!("invalid SMTP server '{server}': {e}")))?;

        let mut builder = match port {
            Some(port) => builder.port(port),
            None => builder,
        };
        if let Some((user, password)) = login {
            builder = builder.credentials(Credentials::new(user.to_string(), password.to_string()));
        }
        Ok(Self::Smtp(builder.build()))
    }

    /// Local `sendmail`-compatible binary.
    pub fn sendmail(program: impl Into<OsString>) -> Self {
        Self::Sendmail(AsyncSendmailTransport::<Tokio1Executor>::new_with_command(
            program,
        ))
    }

    async fn send(&self, message: Message) -> Result<(), AppError> {
        match self {
            Self::Smtp(transport) => transport
                .send(message)
                .await
                .map(|_| ())
                .map_err(|e| AppError::NotifyError(format!("SMTP delivery failed: {e}"))),
            Self::Sendmail(transport) => transport
                .send(message)
                .await
                .map_err(|e| AppError::NotifyError(format!("sendmail failed: {e}"))),
        }
    }
}

/// Delivers digests as plain-text mail.
///
/// Blind copies go into the envelope only and never appear in the message
/// headers. Failed deliveries are retried with waits of 0s, 1s, 4s, ...
pub struct MailNotifier {
    transport: MailTransport,
    from: Option<Mailbox>,
    reply_to: Option<Mailbox>,
    max_tries: u32,
}

impl MailNotifier {
    pub fn new(transport: MailTransport) -> Self {
        Self {
            transport,
            from: None,
            reply_to: None,
            max_tries: 3,
        }
    }

    /// Sender address. Defaults to the recipient.
    pub fn with_from(mut self, from: &str) -> Result<Self, AppError> {
        self.from = Some(parse_mailbox("From", from)?);
        Ok(self)
    }

    pub fn with_reply_to(mut self, reply_to: &str) -> Result<Self, AppError> {
        self.reply_to = Some(parse_mailbox("Reply-To", reply_to)?);
        Ok(self)
    }

    pub fn with_max_tries(mut self, tries: u32) -> Self {
        self.max_tries = tries.max(1);
        self
    }

    /// Build the message for `mail`, headers encoded per RFC 2047.
    pub fn compose(&self, mail: &Mail) -> Result<Message, AppError> {
        let to = parse_mailbox("To", &mail.to)?;
        let from = self.from.clone().unwrap_or_else(|| to.clone());

        let mut builder = Message::builder().from(from).to(to);
        for bcc in mail.bcc.iter().filter(|addr| !addr.is_empty()) {
            builder = builder.bcc(parse_mailbox("Bcc", bcc)?);
        }
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }

        builder
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| AppError::NotifyError(format!("failed to build message: {e}")))
    }
}

impl Notifier for MailNotifier {
    async fn notify(&self, mail: &Mail) -> Result<(), AppError> {
        if mail.to.is_empty() {
            tracing::info!("No mail addresses given, no mails sent");
            return Ok(());
        }

        let message = self.compose(mail)?;

        let mut last_error = None;
        for attempt in 0..self.max_tries {
            match self.transport.send(message.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let wait = Duration::from_secs(u64::from(attempt * attempt));
                    tracing::warn!(
                        to = %mail.to,
                        attempt = attempt + 1,
                        error = %e,
                        wait_secs = wait.as_secs(),
                        "Failed sending mail"
                    );
                    last_error = Some(e);
                    if attempt + 1 < self.max_tries {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AppError::NotifyError("no delivery attempted".into())))
    }
}

fn parse_mailbox(header: &str, address: &str) -> Result<Mailbox, AppError> {
    address
        .parse()
        .map_err(|e| AppError::ConfigError(format!("invalid {header} address '{address}': {e}")))
}
