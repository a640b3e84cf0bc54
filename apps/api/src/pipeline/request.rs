//! Trigger payload normalization. Upstream automation tools send loosely typed
//! JSON and sometimes fill unset fields with placeholder text; this stage turns
//! the raw body into either a typed request or a named rejection.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::job_offer::NewJobOffer;

/// Literal values treated as "not provided".
const PLACEHOLDERS: &[&str] = &["null", "undefined", "0"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("Request body must be a JSON object")]
    InvalidBody,

    #[error("user_id is required")]
    MissingUserId,

    #[error("Field '{0}' holds a placeholder value")]
    PlaceholderValue(&'static str),

    #[error("Field '{0}' must be a string")]
    InvalidType(&'static str),

    #[error("Field '{field}' is not a valid id: '{value}'")]
    InvalidId { field: &'static str, value: String },

    #[error("Provide either job_id or job_title + company + job_url")]
    MissingJobReference,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidBody => "invalid_body",
            RejectionReason::MissingUserId => "missing_user_id",
            RejectionReason::PlaceholderValue(_) => "placeholder_value",
            RejectionReason::InvalidType(_) => "invalid_type",
            RejectionReason::InvalidId { .. } => "invalid_id",
            RejectionReason::MissingJobReference => "missing_job_reference",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReference {
    Existing(Uuid),
    Inline(NewJobOffer),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessJobRequest {
    pub user_id: Uuid,
    pub job: JobReference,
    /// Overrides the offer's contact address when present.
    pub recipient_email: Option<String>,
}

impl ProcessJobRequest {
    pub fn existing_job_id(&self) -> Option<Uuid> {
        match &self.job {
            JobReference::Existing(id) => Some(*id),
            JobReference::Inline(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Absent,
    Placeholder,
    Present(String),
}

impl Field {
    fn into_option(self) -> Option<String> {
        match self {
            Field::Present(v) => Some(v),
            Field::Absent | Field::Placeholder => None,
        }
    }
}

/// Reads the first alias that carries a usable value. A placeholder under one
/// alias does not hide a real value under a later one.
fn read(body: &serde_json::Map<String, Value>, keys: &[&'static str]) -> Result<Field, RejectionReason> {
    let mut field = Field::Absent;
    for key in keys {
        match read_key(body, *key)? {
            Field::Present(v) => return Ok(Field::Present(v)),
            Field::Placeholder => field = Field::Placeholder,
            Field::Absent => {}
        }
    }
    Ok(field)
}

fn read_key(body: &serde_json::Map<String, Value>, key: &'static str) -> Result<Field, RejectionReason> {
    let Some(value) = body.get(key).filter(|v| !v.is_null()) else {
        return Ok(Field::Absent);
    };

    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(RejectionReason::InvalidType(key)),
    };

    if text.is_empty() || PLACEHOLDERS.iter().any(|p| text.eq_ignore_ascii_case(p)) {
        Ok(Field::Placeholder)
    } else {
        Ok(Field::Present(text))
    }
}

fn parse_id(field: &'static str, value: &str) -> Result<Uuid, RejectionReason> {
    Uuid::parse_str(value).map_err(|_| RejectionReason::InvalidId {
        field,
        value: value.to_string(),
    })
}

/// Validates the raw trigger body. `job_id` wins over inline details; a
/// placeholder `job_id` counts as absent so complete inline details still work.
pub fn normalize(body: &Value) -> Result<ProcessJobRequest, RejectionReason> {
    let body = body.as_object().ok_or(RejectionReason::InvalidBody)?;

    let user_id = match read(body, &["user_id"])? {
        Field::Absent => return Err(RejectionReason::MissingUserId),
        Field::Placeholder => return Err(RejectionReason::PlaceholderValue("user_id")),
        Field::Present(v) => parse_id("user_id", &v)?,
    };

    let recipient_email = read(body, &["recipient_email"])?.into_option();

    let job_id = read(body, &["job_id", "job_offer_id"])?;
    if let Field::Present(id) = &job_id {
        return Ok(ProcessJobRequest {
            user_id,
            job: JobReference::Existing(parse_id("job_id", id)?),
            recipient_email,
        });
    }

    let title = read(body, &["job_title"])?;
    let company = read(body, &["company"])?;
    let job_url = read(body, &["job_url"])?;

    for (name, field) in [("job_title", &title), ("company", &company), ("job_url", &job_url)] {
        if *field == Field::Placeholder {
            return Err(RejectionReason::PlaceholderValue(name));
        }
    }

    match (title, company, job_url) {
        (Field::Present(title), Field::Present(company), Field::Present(job_url)) => {
            Ok(ProcessJobRequest {
                user_id,
                job: JobReference::Inline(NewJobOffer {
                    title,
                    company,
                    job_url,
                    city: read(body, &["city"])?.into_option(),
                    country: read(body, &["country"])?.into_option(),
                    description: read(body, &["description"])?.into_option(),
                    contact_email: read(body, &["contact_email"])?.into_option(),
                }),
                recipient_email,
            })
        }
        _ if job_id == Field::Placeholder => Err(RejectionReason::PlaceholderValue("job_id")),
        _ => Err(RejectionReason::MissingJobReference),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const USER: &str = "2b1f0c3e-8d44-4e55-9a77-0f6f1d2c3b4a";
    const JOB: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    #[test]
    fn test_existing_job_id() {
        let request = normalize(&json!({"user_id": USER, "job_id": JOB})).unwrap();
        assert_eq!(request.user_id.to_string(), USER);
        assert_eq!(request.existing_job_id().unwrap().to_string(), JOB);
    }

    #[test]
    fn test_job_offer_id_alias() {
        let request = normalize(&json!({"user_id": USER, "job_offer_id": JOB})).unwrap();
        assert!(request.existing_job_id().is_some());
    }

    #[test]
    fn test_placeholder_job_id_does_not_hide_alias() {
        let request = normalize(&json!({
            "user_id": USER,
            "job_id": "null",
            "job_offer_id": JOB
        }))
        .unwrap();
        assert_eq!(request.existing_job_id().unwrap().to_string(), JOB);

        let request = normalize(&json!({"user_id": USER, "job_id": "", "job_offer_id": JOB})).unwrap();
        assert!(matches!(request.job, JobReference::Existing(_)));
    }

    #[test]
    fn test_placeholder_under_every_alias_is_rejected() {
        assert_eq!(
            normalize(&json!({"user_id": USER, "job_id": "undefined", "job_offer_id": "0"})),
            Err(RejectionReason::PlaceholderValue("job_id"))
        );
    }

    #[test]
    fn test_job_id_takes_precedence_over_inline_details() {
        let request = normalize(&json!({
            "user_id": USER,
            "job_id": JOB,
            "job_title": "Backend Engineer",
            "company": "Acme",
            "job_url": "https://x/1"
        }))
        .unwrap();
        assert!(matches!(request.job, JobReference::Existing(_)));
    }

    #[test]
    fn test_inline_details_with_optional_placeholders() {
        let request = normalize(&json!({
            "user_id": USER,
            "job_title": " Backend Engineer ",
            "company": "Acme",
            "job_url": "https://x/1",
            "city": "undefined",
            "country": "",
            "description": "Rust services",
            "contact_email": null
        }))
        .unwrap();

        let JobReference::Inline(offer) = request.job else {
            panic!("expected inline details");
        };
        assert_eq!(offer.title, "Backend Engineer");
        assert_eq!(offer.city, None);
        assert_eq!(offer.country, None);
        assert_eq!(offer.description.as_deref(), Some("Rust services"));
        assert_eq!(offer.contact_email, None);
    }

    #[test]
    fn test_placeholder_job_id_falls_back_to_inline_details() {
        let request = normalize(&json!({
            "user_id": USER,
            "job_id": "null",
            "job_title": "Backend Engineer",
            "company": "Acme",
            "job_url": "https://x/1"
        }))
        .unwrap();
        assert!(matches!(request.job, JobReference::Inline(_)));
    }

    #[test]
    fn test_placeholder_job_id_without_details_is_rejected() {
        assert_eq!(
            normalize(&json!({"user_id": USER, "job_id": 0})),
            Err(RejectionReason::PlaceholderValue("job_id"))
        );
    }

    #[test]
    fn test_missing_everything_is_rejected() {
        assert_eq!(normalize(&json!({})), Err(RejectionReason::MissingUserId));
        assert_eq!(
            normalize(&json!({"user_id": USER})),
            Err(RejectionReason::MissingJobReference)
        );
        assert_eq!(
            normalize(&json!({"user_id": USER, "job_title": "x", "company": "y"})),
            Err(RejectionReason::MissingJobReference)
        );
    }

    #[test]
    fn test_placeholder_required_fields_are_rejected() {
        assert_eq!(
            normalize(&json!({"user_id": "undefined", "job_id": JOB})),
            Err(RejectionReason::PlaceholderValue("user_id"))
        );
        assert_eq!(
            normalize(&json!({
                "user_id": USER,
                "job_title": "Backend Engineer",
                "company": "NULL",
                "job_url": "https://x/1"
            })),
            Err(RejectionReason::PlaceholderValue("company"))
        );
    }

    #[test]
    fn test_malformed_ids_and_types() {
        assert!(matches!(
            normalize(&json!({"user_id": "u1", "job_id": JOB})),
            Err(RejectionReason::InvalidId { field: "user_id", .. })
        ));
        assert_eq!(
            normalize(&json!({"user_id": USER, "job_id": {"id": 1}})),
            Err(RejectionReason::InvalidType("job_id"))
        );
        assert_eq!(normalize(&json!([USER])), Err(RejectionReason::InvalidBody));
    }

    #[test]
    fn test_rejection_codes() {
        assert_eq!(RejectionReason::MissingJobReference.code(), "missing_job_reference");
        assert_eq!(RejectionReason::PlaceholderValue("job_id").code(), "placeholder_value");
    }
}
