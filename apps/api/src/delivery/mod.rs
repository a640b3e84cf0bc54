//! Delivery Client: sends the cover letter with the CV attached over
//! whichever mail transport is configured.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::EmailSettings;
use crate::files::{FileStore, FileStoreError};
use crate::models::job_offer::JobOffer;
use crate::models::user::User;

pub mod render;
pub mod resend;
pub mod smtp;

pub use resend::ResendMailTransport;
pub use smtp::SmtpMailTransport;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Email delivery is disabled: no transport configured")]
    Disabled,

    #[error("Could not fetch CV attachment: {0}")]
    Attachment(#[from] FileStoreError),

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport verification timed out")]
    VerifyTimeout,
}

/// The candidate the email is sent on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl From<&User> for Sender {
    fn from(user: &User) -> Self {
        Self {
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

/// A fully rendered message handed to a transport.
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub sender_name: String,
    pub reply_to: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
    pub attachment: EmailAttachment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub message_id: String,
    pub recipient: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sends one message and returns the transport's message id.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError>;

    /// Checks credentials/connectivity without sending anything.
    async fn verify(&self) -> Result<(), DeliveryError>;
}

/// Picks the transport by credential presence: the transactional API when its
/// key is set, SMTP when complete, otherwise none (delivery disabled).
pub fn build_transport(
    settings: &EmailSettings,
) -> Result<Option<Arc<dyn MailTransport>>, DeliveryError> {
    if let Some(resend) = &settings.resend {
        info!("Email transport: resend (from {})", resend.from_address);
        let transport: Arc<dyn MailTransport> = Arc::new(ResendMailTransport::new(resend)?);
        return Ok(Some(transport));
    }
    if let Some(smtp) = &settings.smtp {
        info!("Email transport: smtp ({}:{})", smtp.host, smtp.port);
        let transport: Arc<dyn MailTransport> = Arc::new(SmtpMailTransport::new(smtp)?);
        return Ok(Some(transport));
    }
    warn!("No email credentials configured; email delivery is disabled");
    Ok(None)
}

#[derive(Clone)]
pub struct DeliveryClient {
    transport: Option<Arc<dyn MailTransport>>,
    files: Arc<dyn FileStore>,
}

impl DeliveryClient {
    pub fn new(transport: Option<Arc<dyn MailTransport>>, files: Arc<dyn FileStore>) -> Self {
        Self { transport, files }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    pub fn transport_name(&self) -> Option<&'static str> {
        self.transport.as_ref().map(|t| t.name())
    }

    /// Bounded transport check run once at startup.
    pub async fn verify(&self, timeout: Duration) -> Result<(), DeliveryError> {
        let transport = self.transport.as_ref().ok_or(DeliveryError::Disabled)?;
        tokio::time::timeout(timeout, transport.verify())
            .await
            .map_err(|_| DeliveryError::VerifyTimeout)?
    }

    pub async fn send(
        &self,
        offer: &JobOffer,
        cv_file_ref: &str,
        letter_body: &str,
        sender: &Sender,
        recipient: Option<&str>,
    ) -> Result<SentEmail, DeliveryError> {
        let transport = self.transport.as_ref().ok_or(DeliveryError::Disabled)?;

        let data = self.files.fetch(cv_file_ref).await?;

        let to = resolve_recipient(recipient, offer.contact_email.as_deref(), &sender.email);
        let job_url = Some(offer.job_url.as_str());

        let email = OutgoingEmail {
            sender_name: sender.full_name.clone(),
            reply_to: sender.email.clone(),
            to: to.to_string(),
            subject: render::subject(&offer.title, &sender.full_name),
            text_body: render::text_body(letter_body, sender, job_url),
            html_body: render::html_body(letter_body, sender, job_url),
            attachment: EmailAttachment {
                filename: render::attachment_filename(&sender.full_name),
                content_type: "application/pdf",
                data: data.to_vec(),
            },
        };

        let message_id = transport.send(&email).await?;
        info!(
            "Email sent via {} to {} (message id {})",
            transport.name(),
            to,
            message_id
        );

        Ok(SentEmail {
            message_id,
            recipient: to.to_string(),
        })
    }
}

/// Explicit recipient, then the offer's contact address, then the sender.
pub fn resolve_recipient<'a>(
    explicit: Option<&'a str>,
    contact: Option<&'a str>,
    sender_email: &'a str,
) -> &'a str {
    [explicit, contact]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or(sender_email)
}
