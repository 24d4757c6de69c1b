use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::{Notifier, NotifyError};
use crate::config::MailSettings;

/// STARTTLS submission with login credentials.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: &MailSettings) -> Result<Self, NotifyError> {
        let from: Mailbox = settings.sender_email.parse()?;
        let to: Mailbox = settings.recipient_email.parse()?;

        let credentials = Credentials::new(
            settings.sender_email.clone(),
            settings.sender_password.clone(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)?
            .port(settings.smtp_port)
            .credentials(credentials)
            .build();

        debug!(
            "SMTP relay {}:{} as {}",
            settings.smtp_server, settings.smtp_port, settings.sender_email
        );
        Ok(Self { transport, from, to })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        self.transport.send(message).await?;
        info!("Mail sent to {}", self.to);
        Ok(())
    }
}
