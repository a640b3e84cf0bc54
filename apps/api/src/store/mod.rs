//! Record Store Gateway: typed access to users, CVs, job offers, applications,
//! notifications and the diagnostic log.
//!
//! Every operation returns `Result<_, StoreError>`; nothing panics or leaks a
//! driver error type past this boundary. `PgStore` backs production,
//! `MemoryStore` backs the tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::application::{Application, ApplicationUpdate, NewApplication};
use crate::models::cv::Cv;
use crate::models::job_offer::{JobOffer, NewJobOffer};
use crate::models::log_entry::{LogEntry, LogPage, LogQuery, LogStats, NewLogEntry};
use crate::models::notification::{NewNotification, Notification};
use crate::models::user::User;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Connection-level failures mean the store cannot be reached at all; every
/// other driver error stays a database error.
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<User, StoreError>;

    /// Most recent CV for the user.
    async fn get_latest_cv(&self, user_id: Uuid) -> Result<Cv, StoreError>;

    /// User and most recent CV in one lookup. Fails with `NotFound` when the
    /// user has no CV at all.
    async fn get_user_with_latest_cv(&self, user_id: Uuid) -> Result<(User, Cv), StoreError>;

    async fn get_job_offer(&self, id: Uuid) -> Result<JobOffer, StoreError>;

    async fn find_job_offer_by_url(&self, job_url: &str) -> Result<Option<JobOffer>, StoreError>;

    /// Inserts a new offer. Returns `None` when another row already owns the URL.
    async fn insert_job_offer(&self, offer: &NewJobOffer) -> Result<Option<JobOffer>, StoreError>;

    /// Idempotent offer creation keyed on `job_url`: look up first, insert on miss,
    /// and re-read when a concurrent insert won the race.
    async fn create_or_get_job_offer(&self, offer: &NewJobOffer) -> Result<JobOffer, StoreError> {
        if let Some(existing) = self.find_job_offer_by_url(&offer.job_url).await? {
            return Ok(existing);
        }
        if let Some(created) = self.insert_job_offer(offer).await? {
            return Ok(created);
        }
        self.find_job_offer_by_url(&offer.job_url)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Job offer with url {}", offer.job_url)))
    }

    async fn get_application(&self, id: Uuid) -> Result<Application, StoreError>;

    async fn create_application(&self, application: &NewApplication)
        -> Result<Application, StoreError>;

    async fn update_application(&self, id: Uuid, update: &ApplicationUpdate)
        -> Result<(), StoreError>;

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError>;

    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), StoreError>;

    /// A user's log entries, newest first.
    async fn list_user_logs(&self, user_id: Uuid, query: &LogQuery) -> Result<LogPage, StoreError>;

    /// An application's log entries, oldest first.
    async fn list_application_logs(&self, application_id: Uuid)
        -> Result<Vec<LogEntry>, StoreError>;

    async fn log_stats(&self, user_id: Uuid) -> Result<LogStats, StoreError>;
}
