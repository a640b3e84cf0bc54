use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{RecordStore, StoreError};
use crate::models::application::{Application, ApplicationUpdate, NewApplication};
use crate::models::cv::Cv;
use crate::models::job_offer::{JobOffer, NewJobOffer};
use crate::models::log_entry::{LogEntry, LogPage, LogQuery, LogStats, NewLogEntry};
use crate::models::notification::{NewNotification, Notification};
use crate::models::user::User;

/// PostgreSQL-backed gateway. All access is single-row reads and writes; no
/// multi-row transactions.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Flattened row of the user ⨝ latest-CV lookup.
#[derive(FromRow)]
struct UserWithCvRow {
    id: Uuid,
    email: String,
    full_name: String,
    phone: Option<String>,
    profession: Option<String>,
    city: Option<String>,
    country: Option<String>,
    auto_send_enabled: bool,
    created_at: DateTime<Utc>,
    cv_id: Uuid,
    cv_file_url: String,
    cv_skills: Vec<String>,
    cv_experience_years: Option<i32>,
    cv_education: Option<String>,
    cv_created_at: DateTime<Utc>,
    cv_updated_at: DateTime<Utc>,
}

impl UserWithCvRow {
    fn into_parts(self) -> (User, Cv) {
        let cv = Cv {
            id: self.cv_id,
            user_id: self.id,
            file_url: self.cv_file_url,
            skills: self.cv_skills,
            experience_years: self.cv_experience_years,
            education: self.cv_education,
            created_at: self.cv_created_at,
            updated_at: self.cv_updated_at,
        };
        let user = User {
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            phone: self.phone,
            profession: self.profession,
            city: self.city,
            country: self.country,
            auto_send_enabled: self.auto_send_enabled,
            created_at: self.created_at,
        };
        (user, cv)
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {id}")))
    }

    async fn get_latest_cv(&self, user_id: Uuid) -> Result<Cv, StoreError> {
        sqlx::query_as::<_, Cv>(
            "SELECT * FROM cvs WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("CV for user {user_id}")))
    }

    async fn get_user_with_latest_cv(&self, user_id: Uuid) -> Result<(User, Cv), StoreError> {
        let row = sqlx::query_as::<_, UserWithCvRow>(
            r#"
            SELECT u.id, u.email, u.full_name, u.phone, u.profession, u.city, u.country,
                   u.auto_send_enabled, u.created_at,
                   c.id AS cv_id,
                   c.file_url AS cv_file_url,
                   c.skills AS cv_skills,
                   c.experience_years AS cv_experience_years,
                   c.education AS cv_education,
                   c.created_at AS cv_created_at,
                   c.updated_at AS cv_updated_at
            FROM users u
            JOIN LATERAL (
                SELECT * FROM cvs
                WHERE cvs.user_id = u.id
                ORDER BY cvs.created_at DESC
                LIMIT 1
            ) c ON TRUE
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("User {user_id} with a CV")))?;

        Ok(row.into_parts())
    }

    async fn get_job_offer(&self, id: Uuid) -> Result<JobOffer, StoreError> {
        sqlx::query_as::<_, JobOffer>("SELECT * FROM job_offers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Job offer {id}")))
    }

    async fn find_job_offer_by_url(&self, job_url: &str) -> Result<Option<JobOffer>, StoreError> {
        Ok(
            sqlx::query_as::<_, JobOffer>("SELECT * FROM job_offers WHERE job_url = $1")
                .bind(job_url)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_job_offer(&self, offer: &NewJobOffer) -> Result<Option<JobOffer>, StoreError> {
        // The UNIQUE constraint on job_url settles concurrent inserts for the same URL.
        Ok(sqlx::query_as::<_, JobOffer>(
            r#"
            INSERT INTO job_offers
                (id, title, company, city, country, job_url, description, profession, contact_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (job_url) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&offer.title)
        .bind(&offer.company)
        .bind(offer.city_or_default())
        .bind(offer.country_or_default())
        .bind(&offer.job_url)
        .bind(offer.description.as_deref().unwrap_or_default())
        .bind(offer.profession())
        .bind(&offer.contact_email)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn get_application(&self, id: Uuid) -> Result<Application, StoreError> {
        sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Application {id}")))
    }

    async fn create_application(
        &self,
        application: &NewApplication,
    ) -> Result<Application, StoreError> {
        Ok(sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (id, user_id, cv_id, job_offer_id, cover_letter, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(application.user_id)
        .bind(application.cv_id)
        .bind(application.job_offer_id)
        .bind(&application.cover_letter)
        .bind(application.status.as_str())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_application(
        &self,
        id: Uuid,
        update: &ApplicationUpdate,
    ) -> Result<(), StoreError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE applications SET updated_at = NOW()");

        if let Some(status) = update.status {
            query.push(", status = ").push_bind(status.as_str());
        }
        if let Some(letter) = &update.cover_letter {
            query.push(", cover_letter = ").push_bind(letter.clone());
        }
        if let Some(retry_count) = update.retry_count {
            query.push(", retry_count = ").push_bind(retry_count);
        }
        if let Some(at) = update.last_retry_at {
            query.push(", last_retry_at = ").push_bind(at);
        }
        if let Some(message) = &update.error_message {
            query.push(", error_message = ").push_bind(message.clone());
        }
        if let Some(at) = update.applied_at {
            query.push(", applied_at = ").push_bind(at);
        }
        query.push(" WHERE id = ").push_bind(id);

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Application {id}")));
        }
        Ok(())
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> Result<Notification, StoreError> {
        Ok(sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, application_id, kind, message)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.user_id)
        .bind(notification.application_id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn append_log(&self, entry: &NewLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO logs
                (id, user_id, application_id, job_offer_id, level, event, message, metadata, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.application_id)
        .bind(entry.job_offer_id)
        .bind(entry.level.as_str())
        .bind(entry.event.as_str())
        .bind(&entry.message)
        .bind(&entry.metadata)
        .bind(entry.source)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_user_logs(&self, user_id: Uuid, query: &LogQuery) -> Result<LogPage, StoreError> {
        let level = query.level.map(|l| l.as_str());

        let logs = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT * FROM logs
            WHERE user_id = $1 AND ($2::text IS NULL OR level = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(level)
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM logs WHERE user_id = $1 AND ($2::text IS NULL OR level = $2)",
        )
        .bind(user_id)
        .bind(level)
        .fetch_one(&self.pool)
        .await?;

        Ok(LogPage {
            logs,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    async fn list_application_logs(
        &self,
        application_id: Uuid,
    ) -> Result<Vec<LogEntry>, StoreError> {
        Ok(sqlx::query_as::<_, LogEntry>(
            "SELECT * FROM logs WHERE application_id = $1 ORDER BY created_at ASC",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn log_stats(&self, user_id: Uuid) -> Result<LogStats, StoreError> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT level, COUNT(*) FROM logs WHERE user_id = $1 GROUP BY level",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(LogStats::from_counts(
            counts.iter().map(|(level, count)| (level.as_str(), *count)),
        ))
    }
}
