use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing; optional integrations
/// (email, SMS) are simply left unset and degrade to disabled.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub groq_api_key: String,
    pub groq_model: String,
    pub email: EmailSettings,
    pub sms: Option<TwilioSettings>,
    pub sms_default_country_code: String,
    pub generation_max_attempts: u32,
    pub generation_backoff_ms: u64,
    pub port: u16,
    pub rust_log: String,
    pub app_env: String,
}

/// The two interchangeable email credential sets. When both are present the
/// transactional API wins.
#[derive(Debug, Clone, Default)]
pub struct EmailSettings {
    pub resend: Option<ResendSettings>,
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone)]
pub struct ResendSettings {
    pub api_key: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &str| {
            get(key).with_context(|| format!("Required environment variable '{key}' is not set"))
        };

        let resend = get("RESEND_API_KEY").map(|api_key| ResendSettings {
            api_key,
            from_address: get("RESEND_FROM").unwrap_or_else(|| "onboarding@resend.dev".to_string()),
        });

        let smtp = match (get("SMTP_USER"), get("SMTP_PASSWORD")) {
            (Some(username), Some(password)) => Some(SmtpSettings {
                host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port: parse_or(get("SMTP_PORT"), 587, "SMTP_PORT")?,
                username,
                password,
            }),
            _ => None,
        };

        let sms = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioSettings {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Ok(Config {
            database_url: require("DATABASE_URL")?,
            s3_bucket: require("S3_BUCKET")?,
            s3_endpoint: require("S3_ENDPOINT")?,
            aws_access_key_id: require("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require("AWS_SECRET_ACCESS_KEY")?,
            groq_api_key: require("GROQ_API_KEY")?,
            groq_model: get("GROQ_MODEL")
                .unwrap_or_else(|| crate::llm_client::DEFAULT_MODEL.to_string()),
            email: EmailSettings { resend, smtp },
            sms,
            sms_default_country_code: get("SMS_DEFAULT_COUNTRY_CODE")
                .unwrap_or_else(|| "33".to_string()),
            generation_max_attempts: parse_or(
                get("GENERATION_MAX_ATTEMPTS"),
                3,
                "GENERATION_MAX_ATTEMPTS",
            )?,
            generation_backoff_ms: parse_or(
                get("GENERATION_BACKOFF_MS"),
                1000,
                "GENERATION_BACKOFF_MS",
            )?,
            port: parse_or(get("PORT"), 3000, "PORT")?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            app_env: get("APP_ENV").unwrap_or_else(|| "development".to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T, key: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
