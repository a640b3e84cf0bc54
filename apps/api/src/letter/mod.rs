//! Letter Generation Client: builds the prompt from the candidate, CV and
//! offer, calls the generation backend once, and parses a `{subject, body}`
//! result with a plain-text fallback.
//!
//! Only an empty reply (or a transport/API error) is a failure. Retrying is
//! left to the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::letter::prompts::{LETTER_PROMPT_TEMPLATE, LETTER_SYSTEM};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{strip_json_fences, CompletionParams, LlmClient, LlmError};
use crate::models::cv::Cv;
use crate::models::job_offer::JobOffer;
use crate::models::user::User;

pub mod prompts;

const MAX_DESCRIPTION_CHARS: usize = 300;
const MAX_SKILLS: usize = 5;

const LETTER_PARAMS: CompletionParams = CompletionParams {
    temperature: 0.8,
    max_tokens: 500,
    top_p: 0.95,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverLetter {
    pub subject: String,
    pub body: String,
}

impl CoverLetter {
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation backend returned an empty response")]
    EmptyResponse,

    #[error("Generation backend error: {0}")]
    Backend(LlmError),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::EmptyResponse => true,
            GenerationError::Backend(e) => e.is_retryable(),
        }
    }
}

impl From<LlmError> for GenerationError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::EmptyContent => GenerationError::EmptyResponse,
            other => GenerationError::Backend(other),
        }
    }
}

#[async_trait]
pub trait LetterGenerator: Send + Sync {
    async fn generate(
        &self,
        user: &User,
        offer: &JobOffer,
        cv: &Cv,
    ) -> Result<CoverLetter, GenerationError>;
}

pub struct LlmLetterGenerator {
    llm: LlmClient,
}

impl LlmLetterGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl LetterGenerator for LlmLetterGenerator {
    async fn generate(
        &self,
        user: &User,
        offer: &JobOffer,
        cv: &Cv,
    ) -> Result<CoverLetter, GenerationError> {
        info!(
            "Generating cover letter for {} at {} (model: {})",
            offer.title,
            offer.company,
            self.llm.model()
        );

        let prompt = build_letter_prompt(user, offer, cv);
        let system = format!("{LETTER_SYSTEM} {JSON_ONLY_INSTRUCTION}");
        let raw = self.llm.complete(&system, &prompt, LETTER_PARAMS).await?;

        let letter = parse_letter(&raw, user, offer);
        info!("Cover letter generated ({} words)", letter.word_count());
        Ok(letter)
    }
}

fn profession_of(user: &User) -> &str {
    user.profession
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or("Professional")
}

/// Fills the letter template from the candidate, their CV and the offer.
pub fn build_letter_prompt(user: &User, offer: &JobOffer, cv: &Cv) -> String {
    let skills = if cv.skills.is_empty() {
        "Diverse skills".to_string()
    } else {
        cv.skills
            .iter()
            .take(MAX_SKILLS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let education = cv
        .education
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or("Professional training");

    let description_line = match offer.description.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => format!(
            "DESCRIPTION: {}\n",
            d.chars().take(MAX_DESCRIPTION_CHARS).collect::<String>()
        ),
        _ => String::new(),
    };

    LETTER_PROMPT_TEMPLATE
        .replace("{name}", &user.full_name)
        .replace("{profession}", profession_of(user))
        .replace(
            "{experience_years}",
            &cv.experience_years.unwrap_or(0).to_string(),
        )
        .replace("{skills}", &skills)
        .replace("{education}", education)
        .replace("{job_title}", &offer.title)
        .replace("{company}", &offer.company)
        .replace("{description_line}", &description_line)
}

#[derive(Deserialize)]
struct LetterJson {
    subject: Option<String>,
    body: Option<String>,
}

/// Parses the model reply. A reply that is not a complete `{subject, body}`
/// object becomes the body verbatim, with a subject synthesized from the
/// profession and job title.
pub fn parse_letter(raw: &str, user: &User, offer: &JobOffer) -> CoverLetter {
    if let Ok(parsed) = serde_json::from_str::<LetterJson>(strip_json_fences(raw)) {
        let subject = parsed.subject.map(|s| s.trim().to_string()).unwrap_or_default();
        let body = parsed.body.map(|b| b.trim().to_string()).unwrap_or_default();
        if !subject.is_empty() && !body.is_empty() {
            return CoverLetter { subject, body };
        }
    }

    warn!("Generation backend did not return a complete JSON letter, using raw text");

    let body = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    CoverLetter {
        subject: format!("Application {} - {}", profession_of(user), offer.title),
        body,
    }
}
