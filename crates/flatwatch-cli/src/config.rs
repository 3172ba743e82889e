use flatwatch_client::notifier::DEFAULT_SENDMAIL;
use flatwatch_client::{MailNotifier, MailTransport};
use flatwatch_core::AppError;

/// Authenticated SMTP relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    /// `host` or `host:port`
    pub server: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Mail delivery settings.
///
/// - `FLATWATCH_MAIL_TO` (required unless mail is disabled)
/// - `FLATWATCH_MAIL_BCC` (optional, comma separated)
/// - `FLATWATCH_MAIL_FROM` (optional)
/// - `FLATWATCH_MAIL_REPLY_TO` (optional)
/// - `FLATWATCH_SMTP_SERVER` (optional, selects SMTP over sendmail)
/// - `FLATWATCH_SMTP_USER` / `FLATWATCH_SMTP_PASSWORD` (optional, set together)
/// - `FLATWATCH_SENDMAIL` (optional, defaults to `/usr/sbin/sendmail`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub to: String,
    pub bcc: Vec<String>,
    pub from: Option<String>,
    pub reply_to: Option<String>,
    pub smtp: Option<SmtpSettings>,
    pub sendmail: String,
}

impl MailConfig {
    pub fn from_env(require_recipient: bool) -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok(), require_recipient)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        require_recipient: bool,
    ) -> Result<Self, AppError> {
        let value = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let to = match value("FLATWATCH_MAIL_TO") {
            Some(to) => to,
            None if require_recipient => {
                return Err(AppError::ConfigError(
                    "FLATWATCH_MAIL_TO not set. Required unless --no-email is given.".into(),
                ));
            }
            None => String::new(),
        };

        let bcc = value("FLATWATCH_MAIL_BCC")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|addr| !addr.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let user = value("FLATWATCH_SMTP_USER");
        // Taken verbatim, not trimmed.
        let password = lookup("FLATWATCH_SMTP_PASSWORD").filter(|p| !p.is_empty());
        let smtp = match value("FLATWATCH_SMTP_SERVER") {
            Some(server) => {
                if user.is_some() != password.is_some() {
                    return Err(AppError::ConfigError(
                        "FLATWATCH_SMTP_USER and FLATWATCH_SMTP_PASSWORD must be set together"
                            .into(),
                    ));
                }
                Some(SmtpSettings {
                    server,
                    user,
                    password,
                })
            }
            None if user.is_some() => {
                return Err(AppError::ConfigError(
                    "FLATWATCH_SMTP_USER is set but FLATWATCH_SMTP_SERVER is not".into(),
                ));
            }
            None => None,
        };

        Ok(Self {
            to,
            bcc,
            from: value("FLATWATCH_MAIL_FROM"),
            reply_to: value("FLATWATCH_MAIL_REPLY_TO"),
            smtp,
            sendmail: value("FLATWATCH_SENDMAIL").unwrap_or_else(|| DEFAULT_SENDMAIL.to_string()),
        })
    }

    /// The delivery transport: SMTP when a server is configured, else sendmail.
    pub fn transport(&self) -> Result<MailTransport, AppError> {
        match &self.smtp {
            Some(smtp) => {
                let login = smtp.user.as_deref().zip(smtp.password.as_deref());
                MailTransport::smtp(&smtp.server, login)
            }
            None => Ok(MailTransport::sendmail(&self.sendmail)),
        }
    }

    pub fn notifier(&self) -> Result<MailNotifier, AppError> {
        let mut notifier = MailNotifier::new(self.transport()?);
        if let Some(from) = &self.from {
            notifier = notifier.with_from(from)?;
        }
        if let Some(reply_to) = &self.reply_to {
            notifier = notifier.with_reply_to(reply_to)?;
        }
        Ok(notifier)
    }
}
