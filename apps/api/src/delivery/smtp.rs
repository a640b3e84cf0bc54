//! SMTP transport built on lettre. Port 465 uses implicit TLS, anything else
//! STARTTLS.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use super::{DeliveryError, MailTransport, OutgoingEmail};
use crate::config::SmtpSettings;

pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: Address,
}

impl SmtpMailTransport {
    pub fn new(settings: &SmtpSettings) -> Result<Self, DeliveryError> {
        let from_address = parse_address(&settings.username)?;

        let builder = if settings.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
        }
        .map_err(|e| DeliveryError::Transport(format!("Failed to configure SMTP relay: {e}")))?;

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(30)))
            .build();

        Ok(Self {
            transport,
            from_address,
        })
    }

    /// Builds the MIME message and the id stamped on it.
    pub fn build_message(&self, email: &OutgoingEmail) -> Result<(Message, String), DeliveryError> {
        let from = Mailbox::new(Some(email.sender_name.clone()), self.from_address.clone());
        let reply_to = Mailbox::new(None, parse_address(&email.reply_to)?);
        let to = Mailbox::new(None, parse_address(&email.to)?);

        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.from_address.domain());

        let content_type = ContentType::parse(email.attachment.content_type)
            .map_err(|e| DeliveryError::Build(format!("Invalid attachment content type: {e}")))?;
        let attachment = Attachment::new(email.attachment.filename.clone())
            .body(email.attachment.data.clone(), content_type);

        let message = Message::builder()
            .from(from)
            .reply_to(reply_to)
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id.clone()))
            .multipart(
                MultiPart::mixed()
                    .multipart(MultiPart::alternative_plain_html(
                        email.text_body.clone(),
                        email.html_body.clone(),
                    ))
                    .singlepart(attachment),
            )
            .map_err(|e| DeliveryError::Build(e.to_string()))?;

        Ok((message, message_id))
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError> {
        let (message, message_id) = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Transport(format!("SMTP send failed: {e}")))?;
        Ok(message_id)
    }

    async fn verify(&self) -> Result<(), DeliveryError> {
        match self.transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(DeliveryError::Transport(
                "SMTP server rejected the connection test".to_string(),
            )),
            Err(e) => Err(DeliveryError::Transport(format!(
                "SMTP connection test failed: {e}"
            ))),
        }
    }
}

fn parse_address(raw: &str) -> Result<Address, DeliveryError> {
    raw.trim()
        .parse::<Address>()
        .map_err(|e| DeliveryError::InvalidAddress {
            address: raw.to_string(),
            reason: e.to_string(),
        })
}
