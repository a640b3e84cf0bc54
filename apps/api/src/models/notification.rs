use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Letter ready, waiting for a manual send.
    Generated,
    Sent,
    /// Letter saved but the email could not be delivered.
    EmailFailed,
    Failed,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Generated => "generated",
            NotificationKind::Sent => "sent",
            NotificationKind::EmailFailed => "email_failed",
            NotificationKind::Failed => "failed",
        }
    }
}

/// Append-only. The pipeline never updates or deletes these rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub application_id: Option<Uuid>,
    pub kind: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub application_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub message: String,
}
