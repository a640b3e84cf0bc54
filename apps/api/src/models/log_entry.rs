use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    JobReceived,
    UserFetched,
    CvFetched,
    OfferFetched,
    AiCalled,
    AiSuccess,
    AiFailed,
    EmailSent,
    EmailFailed,
    SmsSent,
    SmsFailed,
    ApplicationCreated,
    ApplicationFailed,
    RetryAttempted,
    StatusChanged,
    JobProcessed,
}

impl LogEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            LogEvent::JobReceived => "job_received",
            LogEvent::UserFetched => "user_fetched",
            LogEvent::CvFetched => "cv_fetched",
            LogEvent::OfferFetched => "offer_fetched",
            LogEvent::AiCalled => "ai_called",
            LogEvent::AiSuccess => "ai_success",
            LogEvent::AiFailed => "ai_failed",
            LogEvent::EmailSent => "email_sent",
            LogEvent::EmailFailed => "email_failed",
            LogEvent::SmsSent => "sms_sent",
            LogEvent::SmsFailed => "sms_failed",
            LogEvent::ApplicationCreated => "application_created",
            LogEvent::ApplicationFailed => "application_failed",
            LogEvent::RetryAttempted => "retry_attempted",
            LogEvent::StatusChanged => "status_changed",
            LogEvent::JobProcessed => "job_processed",
        }
    }
}

/// Diagnostic record. Not authoritative application state.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub job_offer_id: Option<Uuid>,
    pub level: String,
    pub event: String,
    pub message: String,
    pub metadata: Option<Value>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub user_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub job_offer_id: Option<Uuid>,
    pub level: LogLevel,
    pub event: LogEvent,
    pub message: String,
    pub metadata: Option<Value>,
    pub source: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogPage {
    pub logs: Vec<LogEntry>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total: i64,
    pub info: i64,
    pub success: i64,
    pub warning: i64,
    pub error: i64,
}

impl LogStats {
    /// Folds `(level, count)` pairs as returned by a GROUP BY query.
    pub fn from_counts<'a>(counts: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        let mut stats = LogStats::default();
        for (level, count) in counts {
            stats.total += count;
            match level {
                "info" => stats.info += count,
                "success" => stats.success += count,
                "warning" => stats.warning += count,
                "error" => stats.error += count,
                _ => {}
            }
        }
        stats
    }
}
