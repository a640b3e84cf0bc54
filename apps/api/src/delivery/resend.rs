//! Transactional-email transport over the Resend HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DeliveryError, MailTransport, OutgoingEmail};
use crate::config::ResendSettings;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

pub struct ResendMailTransport {
    client: Client,
    api_key: String,
    from_address: String,
}

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: String,
    to: Vec<&'a str>,
    reply_to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    attachments: Vec<ResendAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct ResendAttachment<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ResendResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendErrorBody {
    message: Option<String>,
}

impl ResendMailTransport {
    pub fn new(settings: &ResendSettings) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            from_address: settings.from_address.clone(),
        })
    }

    fn payload<'a>(&self, email: &'a OutgoingEmail) -> ResendEmail<'a> {
        ResendEmail {
            from: format!("{} <{}>", email.sender_name, self.from_address),
            to: vec![email.to.as_str()],
            reply_to: &email.reply_to,
            subject: &email.subject,
            html: &email.html_body,
            text: &email.text_body,
            attachments: vec![ResendAttachment {
                filename: &email.attachment.filename,
                content: STANDARD.encode(&email.attachment.data),
            }],
        }
    }
}

#[async_trait]
impl MailTransport for ResendMailTransport {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<String, DeliveryError> {
        debug!("Sending email to {} via resend", email.to);

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ResendErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(body);
            return Err(DeliveryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let sent: ResendResponse = response.json().await?;
        Ok(sent.id)
    }

    /// The API has no connection to test; a non-empty key is all that can be
    /// checked without sending.
    async fn verify(&self) -> Result<(), DeliveryError> {
        if self.api_key.trim().is_empty() {
            return Err(DeliveryError::Transport("Resend API key is empty".to_string()));
        }
        Ok(())
    }
}
