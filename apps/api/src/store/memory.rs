//! In-memory `RecordStore` with fault injection, used by pipeline and route tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{RecordStore, StoreError};
use crate::models::application::{
    Application, ApplicationStatus, ApplicationUpdate, NewApplication,
};
use crate::models::cv::Cv;
use crate::models::job_offer::{JobOffer, NewJobOffer};
use crate::models::log_entry::{LogEntry, LogPage, LogQuery, LogStats, NewLogEntry};
use crate::models::notification::{NewNotification, Notification};
use crate::models::user::User;

/// Store operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateJobOffer,
    CreateApplication,
    /// Any application update that carries a cover letter.
    StoreLetter,
    /// Any application update that moves the status to `sent`.
    MarkSent,
    AppendLog,
    /// The next lookup by URL misses even when the offer exists, as when a
    /// concurrent run inserts between lookup and insert.
    StaleOfferLookup,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    cvs: Vec<Cv>,
    job_offers: Vec<JobOffer>,
    applications: Vec<Application>,
    notifications: Vec<Notification>,
    logs: Vec<LogEntry>,
    job_offer_inserts: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failures: Mutex<HashSet<FailPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, point: FailPoint) {
        self.failures.lock().unwrap().insert(point);
    }

    fn should_fail(&self, point: FailPoint) -> bool {
        self.failures.lock().unwrap().contains(&point)
    }

    fn take_failure(&self, point: FailPoint) -> bool {
        self.failures.lock().unwrap().remove(&point)
    }

    pub fn add_user(&self, full_name: &str, email: &str, auto_send_enabled: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            phone: Some("06 12 34 56 78".to_string()),
            profession: Some("Software Engineer".to_string()),
            city: Some("Lyon".to_string()),
            country: Some("France".to_string()),
            auto_send_enabled,
            created_at: Utc::now(),
        };
        self.inner.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn add_cv(&self, user_id: Uuid, skills: &[&str], experience_years: i32) -> Cv {
        let now = Utc::now();
        let cv = Cv {
            id: Uuid::new_v4(),
            user_id,
            file_url: format!("https://files.example.com/storage/v1/object/public/cvs/{user_id}/cv.pdf"),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience_years: Some(experience_years),
            education: Some("MSc Computer Science".to_string()),
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().cvs.push(cv.clone());
        cv
    }

    pub fn add_job_offer(&self, title: &str, company: &str, job_url: &str) -> JobOffer {
        let offer = JobOffer {
            id: Uuid::new_v4(),
            title: title.to_string(),
            company: company.to_string(),
            city: "Paris".to_string(),
            country: "France".to_string(),
            job_url: job_url.to_string(),
            description: Some("Build and operate backend services.".to_string()),
            profession: Some(title.to_string()),
            contact_email: Some("jobs@example.com".to_string()),
            scraped_at: Utc::now(),
        };
        self.inner.lock().unwrap().job_offers.push(offer.clone());
        offer
    }

    pub fn applications(&self) -> Vec<Application> {
        self.inner.lock().unwrap().applications.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().notifications.clone()
    }

    pub fn job_offers(&self) -> Vec<JobOffer> {
        self.inner.lock().unwrap().job_offers.clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.lock().unwrap().logs.clone()
    }

    /// Number of successful offer inserts performed through the gateway.
    pub fn job_offer_inserts(&self) -> usize {
        self.inner.lock().unwrap().job_offer_inserts
    }
}

fn apply_update(application: &mut Application, update: &ApplicationUpdate) {
    if let Some(status) = update.status {
        application.status = status.as_str().to_string();
    }
    if let Some(letter) = &update.cover_letter {
        application.cover_letter = Some(letter.clone());
    }
    if let Some(retry_count) = update.retry_count {
        application.retry_count = retry_count;
    }
    if let Some(at) = update.last_retry_at {
        application.last_retry_at = Some(at);
    }
    if let Some(message) = &update.error_message {
        application.error_message = message.clone();
    }
    if let Some(at) = update.applied_at {
        application.applied_at = Some(at);
    }
    application.updated_at = Utc::now();
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("User {id}")))
    }

    async fn get_latest_cv(&self, user_id: Uuid) -> Result<Cv, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .cvs
            .iter()
            .filter(|c| c.user_id == user_id)
            .max_by_key(|c| c.created_at)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("CV for user {user_id}")))
    }

    async fn get_user_with_latest_cv(&self, user_id: Uuid) -> Result<(User, Cv), StoreError> {
        let user = self.get_user(user_id).await?;
        let cv = self.get_latest_cv(user_id).await?;
        Ok((user, cv))
    }

    async fn get_job_offer(&self, id: Uuid) -> Result<JobOffer, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .job_offers
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Job offer {id}")))
    }

    async fn find_job_offer_by_url(&self, job_url: &str) -> Result<Option<JobOffer>, StoreError> {
        if self.take_failure(FailPoint::StaleOfferLookup) {
            return Ok(None);
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .job_offers
            .iter()
            .find(|o| o.job_url == job_url)
            .cloned())
    }

    async fn insert_job_offer(&self, offer: &NewJobOffer) -> Result<Option<JobOffer>, StoreError> {
        if self.should_fail(FailPoint::CreateJobOffer) {
            return Err(StoreError::Unavailable("job_offers insert rejected".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        if inner.job_offers.iter().any(|o| o.job_url == offer.job_url) {
            return Ok(None);
        }
        let created = JobOffer {
            id: Uuid::new_v4(),
            title: offer.title.clone(),
            company: offer.company.clone(),
            city: offer.city_or_default().to_string(),
            country: offer.country_or_default().to_string(),
            job_url: offer.job_url.clone(),
            description: Some(offer.description.clone().unwrap_or_default()),
            profession: Some(offer.profession().to_string()),
            contact_email: offer.contact_email.clone(),
            scraped_at: Utc::now(),
        };
        inner.job_offers.push(created.clone());
        inner.job_offer_inserts += 1;
        Ok(Some(created))
    }

    async fn get_application(&self, id: Uuid) -> Result<Application, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .applications
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Application {id}")))
    }

    async fn create_application(
        &self,
        application: &NewApplication,
    ) -> Result<Application, StoreError> {
        if self.should_fail(FailPoint::CreateApplication) {
            return Err(StoreError::Unavailable("applications insert rejected".to_string()));
        }
        let now = Utc::now();
        let created = Application {
            id: Uuid::new_v4(),
            user_id: application.user_id,
            cv_id: application.cv_id,
            job_offer_id: application.job_offer_id,
            cover_letter: Some(application.cover_letter.clone()),
            status: application.status.as_str().to_string(),
            retry_count: 0,
            last_retry_at: None,
            error_message: None,
            applied_at: None,
            response_received_at: None,
            created_at: now,
            updated_at: now,
        };
        self.inner.lock().unwrap().applications.push(created.clone());
        Ok(created)
    }

    async fn update_application(
        &self,
        id: Uuid,
        update: &ApplicationUpdate,
    ) -> Result<(), StoreError> {
        if update.cover_letter.is_some() && self.should_fail(FailPoint::StoreLetter) {
            return Err(StoreError::Unavailable("cover letter update rejected".to_string()));
        }
        if update.status == Some(ApplicationStatus::Sent) && self.should_fail(FailPoint::MarkSent) {
            return Err(StoreError::Unavailable("status update rejected".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let application = inner
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Application {id}")))?;
        apply_update(application, update);
        Ok(())
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError> {
        let created = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            application_id: notification.application_id,
            kind: notification.kind.as_str().to_string(),
            message: notification.message.clone(),
            sent_at: Utc::now(),
        };
        self.inner.lock().unwrap().notifications.push(created.clone());
        Ok(created)
    }

    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), StoreError> {
        if self.should_fail(FailPoint::AppendLog) {
            return Err(StoreError::Unavailable("logs insert rejected".to_string()));
        }
        self.inner.lock().unwrap().logs.push(LogEntry {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            application_id: entry.application_id,
            job_offer_id: entry.job_offer_id,
            level: entry.level.as_str().to_string(),
            event: entry.event.as_str().to_string(),
            message: entry.message.clone(),
            metadata: entry.metadata.clone(),
            source: entry.source.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_user_logs(&self, user_id: Uuid, query: &LogQuery) -> Result<LogPage, StoreError> {
        let inner = self.inner.lock().unwrap();
        let matching: Vec<&LogEntry> = inner
            .logs
            .iter()
            .rev()
            .filter(|l| l.user_id == Some(user_id))
            .filter(|l| query.level.map_or(true, |level| l.level == level.as_str()))
            .collect();

        Ok(LogPage {
            total: matching.len() as i64,
            logs: matching
                .into_iter()
                .skip(query.offset.max(0) as usize)
                .take(query.limit.max(0) as usize)
                .cloned()
                .collect(),
            limit: query.limit,
            offset: query.offset,
        })
    }

    async fn list_application_logs(
        &self,
        application_id: Uuid,
    ) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .logs
            .iter()
            .filter(|l| l.application_id == Some(application_id))
            .cloned()
            .collect())
    }

    async fn log_stats(&self, user_id: Uuid) -> Result<LogStats, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(LogStats::from_counts(
            inner
                .logs
                .iter()
                .filter(|l| l.user_id == Some(user_id))
                .map(|l| (l.level.as_str(), 1)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(url: &str) -> NewJobOffer {
        NewJobOffer {
            title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            job_url: url.to_string(),
            city: None,
            country: None,
            description: None,
            contact_email: None,
        }
    }

    #[tokio::test]
    async fn test_create_or_get_job_offer_is_idempotent_on_url() {
        let store = MemoryStore::new();

        let first = store.create_or_get_job_offer(&details("https://x/1")).await.unwrap();
        let second = store.create_or_get_job_offer(&details("https://x/1")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.job_offers().len(), 1);
        assert_eq!(store.job_offer_inserts(), 1);
    }

    #[tokio::test]
    async fn test_create_or_get_job_offer_rereads_after_lost_insert_race() {
        let store = MemoryStore::new();
        let existing = store.create_or_get_job_offer(&details("https://x/1")).await.unwrap();

        store.fail_on(FailPoint::StaleOfferLookup);
        let resolved = store.create_or_get_job_offer(&details("https://x/1")).await.unwrap();

        assert_eq!(resolved.id, existing.id);
        assert_eq!(store.job_offers().len(), 1);
        assert_eq!(store.job_offer_inserts(), 1);
    }

    #[tokio::test]
    async fn test_create_or_get_job_offer_applies_location_defaults() {
        let store = MemoryStore::new();
        let offer = store.create_or_get_job_offer(&details("https://x/2")).await.unwrap();

        assert_eq!(offer.city, "unspecified");
        assert_eq!(offer.country, "unspecified");
        assert_eq!(offer.profession.as_deref(), Some("Backend Engineer"));
    }

    #[tokio::test]
    async fn test_create_or_get_job_offer_matches_exact_url_only() {
        let store = MemoryStore::new();
        store.create_or_get_job_offer(&details("https://x/1")).await.unwrap();
        store.create_or_get_job_offer(&details("https://x/1/")).await.unwrap();

        assert_eq!(store.job_offers().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_reports_conflict_as_none() {
        let store = MemoryStore::new();
        assert!(store.insert_job_offer(&details("https://x/3")).await.unwrap().is_some());
        assert!(store.insert_job_offer(&details("https://x/3")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_cv_wins() {
        let store = MemoryStore::new();
        let user = store.add_user("Ada Lovelace", "ada@example.com", false);
        store.add_cv(user.id, &["Rust"], 2);
        let newest = store.add_cv(user.id, &["Rust", "Go"], 5);

        let (_, cv) = store.get_user_with_latest_cv(user.id).await.unwrap();
        assert_eq!(cv.id, newest.id);
    }

    #[tokio::test]
    async fn test_user_without_cv_is_not_found() {
        let store = MemoryStore::new();
        let user = store.add_user("Ada Lovelace", "ada@example.com", false);

        let err = store.get_user_with_latest_cv(user.id).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
