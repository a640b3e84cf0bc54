use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub profession: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    /// Gate for unattended sending. When false the pipeline stops at `pending`.
    pub auto_send_enabled: bool,
    pub created_at: DateTime<Utc>,
}
