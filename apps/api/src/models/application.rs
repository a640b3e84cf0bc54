use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Lifecycle of an application record.
///
/// The pipeline only ever writes `processing`, `pending`, `sent` and `failed`.
/// The remaining states are manual edits made outside the pipeline; they are
/// modelled so stored rows always parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Processing,
    Pending,
    Sent,
    Failed,
    Accepted,
    Rejected,
    Interview,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Processing => "processing",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Sent => "sent",
            ApplicationStatus::Failed => "failed",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Interview => "interview",
        }
    }

    /// Transitions the pipeline is allowed to perform.
    ///
    /// `processing -> pending | failed`, `pending -> sent`. Nothing leaves `sent`
    /// or `failed` from inside the pipeline.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Processing, ApplicationStatus::Pending)
                | (ApplicationStatus::Processing, ApplicationStatus::Failed)
                | (ApplicationStatus::Pending, ApplicationStatus::Sent)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ApplicationStatus::Processing),
            "pending" => Ok(ApplicationStatus::Pending),
            "sent" => Ok(ApplicationStatus::Sent),
            "failed" => Ok(ApplicationStatus::Failed),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            "interview" => Ok(ApplicationStatus::Interview),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cv_id: Uuid,
    pub job_offer_id: Uuid,
    pub cover_letter: Option<String>,
    pub status: String,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub applied_at: Option<DateTime<Utc>>,
    pub response_received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_id: Uuid,
    pub cv_id: Uuid,
    pub job_offer_id: Uuid,
    pub cover_letter: String,
    pub status: ApplicationStatus,
}

/// Partial update. `None` leaves a column untouched; `error_message: Some(None)`
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct ApplicationUpdate {
    pub status: Option<ApplicationStatus>,
    pub cover_letter: Option<String>,
    pub retry_count: Option<i32>,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<Option<String>>,
    pub applied_at: Option<DateTime<Utc>>,
}
