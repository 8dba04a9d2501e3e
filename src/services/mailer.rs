#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to_name: Option<String>,
    pub to_email: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound-mail seam. The lifecycle only depends on this trait, so tests and
/// local runs can swap the transport out.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct SmtpNotifier {
    host: String,
    port: u16,
    credentials: Credentials,
    from_name: String,
    from_address: String,
}

impl SmtpNotifier {
    pub fn new(
        host: String,
        port: u16,
        username: String,
        password: String,
        from_name: String,
        from_address: String,
    ) -> Self {
        Self {
            host,
            port,
            credentials: Credentials::new(username, password),
            from_name,
            from_address,
        }
    }

    fn build_transport(&self) -> Result<SmtpTransport, AppError> {
        let transport = SmtpTransport::relay(&self.host)
            .map_err(|err| AppError::Notify(format!("smtp relay setup failed: {err}")))?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build();
        Ok(transport)
    }

    fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        let to_header = match &message.to_name {
            Some(name) => format!("{} <{}>", name, message.to_email),
            None => message.to_email.clone(),
        };
        let email = Message::builder()
            .from(
                self.from_header()
                    .parse()
                    .map_err(|err| AppError::Notify(format!("invalid sender address: {err}")))?,
            )
            .to(to_header
                .parse()
                .map_err(|err| AppError::Notify(format!("invalid recipient address: {err}")))?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.html_body.clone())
            .map_err(|err| AppError::Notify(format!("failed to build email: {err}")))?;

        let mailer = self.build_transport()?;

        // lettre's SmtpTransport is blocking, keep it off the runtime threads.
        tokio::task::spawn_blocking(move || {
            mailer
                .send(&email)
                .map(|_| ())
                .map_err(|err| AppError::Notify(format!("failed to send email: {err}")))
        })
        .await
        .map_err(|err| AppError::Notify(format!("email task failed: {err}")))?
    }
}

/// Development transport: writes the message to the log instead of sending
/// it, confirmation link included.
#[derive(Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &MailMessage) -> Result<(), AppError> {
        info!(
            to = %message.to_email,
            subject = %message.subject,
            "mail transport not configured, logging message instead"
        );
        info!("{}", message.html_body);
        Ok(())
    }
}

const MONTHS_PT_BR: [&str; 12] = [
    "janeiro",
    "fevereiro",
    "março",
    "abril",
    "maio",
    "junho",
    "julho",
    "agosto",
    "setembro",
    "outubro",
    "novembro",
    "dezembro",
];

/// "10 de março de 2025", matching the long date form used in the mails.
pub fn format_date_pt_br(date: DateTime<Utc>) -> String {
    let month = MONTHS_PT_BR[date.month0() as usize];
    format!("{} de {} de {}", date.day(), month, date.year())
}
