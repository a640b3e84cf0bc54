//! Notification Client: short status texts to the candidate's phone.
//! Failures here never fail a pipeline run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::TwilioSettings;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const PLACEHOLDER_AUTH_TOKEN: &str = "your_auth_token_here";

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("SMS is disabled: no provider configured")]
    Disabled,

    #[error("Unrecognised phone number format: '{0}'")]
    InvalidPhone(String),

    #[error("Invalid SMS configuration: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// Which text to send. Mirrors the outcome of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsStatus {
    Sent,
    Pending,
    Failed,
}

impl SmsStatus {
    pub fn message(&self, job_title: &str, company: &str) -> String {
        match self {
            SmsStatus::Sent => format!("Application sent for {job_title} at {company}!"),
            SmsStatus::Pending => format!(
                "A new application for {job_title} at {company} has just been generated!"
            ),
            SmsStatus::Failed => format!(
                "Sending failed for {job_title} at {company}. Check your dashboard."
            ),
        }
    }
}

#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Sends `body` to an already normalized E.164 number; returns the provider id.
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsError>;
}

pub struct TwilioSms {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

#[derive(Debug, Deserialize)]
struct TwilioMessage {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

impl TwilioSms {
    pub fn new(settings: &TwilioSettings) -> Result<Self, SmsError> {
        if !settings.account_sid.starts_with("AC") {
            return Err(SmsError::Configuration(
                "TWILIO_ACCOUNT_SID must start with 'AC'".to_string(),
            ));
        }
        if settings.auth_token == PLACEHOLDER_AUTH_TOKEN {
            return Err(SmsError::Configuration(
                "TWILIO_AUTH_TOKEN still holds the placeholder value".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from_number: settings.from_number.clone(),
        })
    }
}

#[async_trait]
impl SmsSender for TwilioSms {
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsError> {
        let url = format!("{TWILIO_API_BASE}/Accounts/{}/Messages.json", self.account_sid);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TwilioErrorBody>(&raw)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(raw);
            return Err(SmsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let message: TwilioMessage = response.json().await?;
        Ok(message.sid)
    }
}

#[derive(Clone)]
pub struct SmsNotifier {
    sender: Option<Arc<dyn SmsSender>>,
    default_country_code: String,
}

impl SmsNotifier {
    pub fn new(sender: Option<Arc<dyn SmsSender>>, default_country_code: impl Into<String>) -> Self {
        Self {
            sender,
            default_country_code: default_country_code.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, "33")
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    pub async fn notify(
        &self,
        phone: &str,
        status: SmsStatus,
        job_title: &str,
        company: &str,
    ) -> Result<String, SmsError> {
        let sender = self.sender.as_ref().ok_or(SmsError::Disabled)?;
        let to = normalize_phone(phone, &self.default_country_code)
            .ok_or_else(|| SmsError::InvalidPhone(phone.to_string()))?;
        let body = status.message(job_title, company);

        debug!("Sending SMS to {}: {}", to, body);
        let sid = sender.send(&to, &body).await?;
        info!("SMS sent (sid {})", sid);
        Ok(sid)
    }
}

/// Normalizes to E.164. A leading `0` is a national number in the default
/// country; a leading country code without `+` gets one. Anything else is
/// unrecognised.
pub fn normalize_phone(raw: &str, default_country_code: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '.' | '(' | ')'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }
    if cleaned.starts_with('+') {
        return Some(cleaned);
    }
    if let Some(national) = cleaned.strip_prefix('0') {
        return Some(format!("+{default_country_code}{national}"));
    }
    if !default_country_code.is_empty() && cleaned.starts_with(default_country_code) {
        return Some(format!("+{cleaned}"));
    }
    None
}
