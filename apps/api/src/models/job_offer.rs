use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored in `city` / `country` when the inbound details leave them out.
pub const UNSPECIFIED_LOCATION: &str = "unspecified";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobOffer {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub city: String,
    pub country: String,
    /// Unique. Offers are deduplicated on exact match of this column.
    pub job_url: String,
    pub description: Option<String>,
    pub profession: Option<String>,
    pub contact_email: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Inline job details used to synthesize an offer when no id is supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJobOffer {
    pub title: String,
    pub company: String,
    pub job_url: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub contact_email: Option<String>,
}

impl NewJobOffer {
    pub fn city_or_default(&self) -> &str {
        self.city.as_deref().unwrap_or(UNSPECIFIED_LOCATION)
    }

    pub fn country_or_default(&self) -> &str {
        self.country.as_deref().unwrap_or(UNSPECIFIED_LOCATION)
    }

    /// The profession column mirrors the job title for synthesized offers.
    pub fn profession(&self) -> &str {
        &self.title
    }
}
