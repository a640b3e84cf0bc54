//! Application Pipeline: resolve user and CV, resolve or create the offer,
//! draft the application, generate the letter with retries, persist it,
//! optionally email it, text the candidate, and record the outcome.
//!
//! Every step failure ends the run with a terminal state and a notification;
//! nothing propagates to the trigger.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info_span, warn, Instrument};
use uuid::Uuid;

use crate::delivery::{DeliveryClient, Sender};
use crate::letter::{CoverLetter, GenerationError, LetterGenerator};
use crate::models::application::{ApplicationStatus, ApplicationUpdate, NewApplication};
use crate::models::cv::Cv;
use crate::models::job_offer::JobOffer;
use crate::models::log_entry::LogEvent;
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::user::User;
use crate::outcome_log::{LogContext, OutcomeLogger};
use crate::retry::{with_retry, RetryPolicy};
use crate::sms::{SmsError, SmsNotifier, SmsStatus};
use crate::store::RecordStore;

pub mod dispatch;
pub mod request;

pub use request::{normalize, JobReference, ProcessJobRequest, RejectionReason};

/// Letter text stored on the draft until generation completes.
const DRAFT_LETTER: &str = "Generation in progress...";

fn status_update(from: ApplicationStatus, to: ApplicationStatus) -> ApplicationUpdate {
    debug_assert!(from.can_transition_to(to), "illegal transition {from} -> {to}");
    ApplicationUpdate {
        status: Some(to),
        ..Default::default()
    }
}

/// What a run ended with. Only the synchronous endpoint returns this to the
/// caller; the fire-and-forget path just logs it.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub application_id: Option<Uuid>,
    pub job_offer_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
    pub subject: Option<String>,
    pub cover_letter: Option<String>,
    pub email_sent: bool,
    pub execution_time_ms: u64,
    pub error: Option<String>,
}

impl RunOutcome {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            application_id: None,
            job_offer_id: None,
            status: None,
            subject: None,
            cover_letter: None,
            email_sent: false,
            execution_time_ms: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn fail(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// Result of the isolated email step.
enum EmailOutcome {
    Skipped,
    Sent,
    Failed,
}

pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    generator: Arc<dyn LetterGenerator>,
    delivery: DeliveryClient,
    sms: SmsNotifier,
    logger: OutcomeLogger,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        generator: Arc<dyn LetterGenerator>,
        delivery: DeliveryClient,
        sms: SmsNotifier,
        retry: RetryPolicy,
    ) -> Self {
        let logger = OutcomeLogger::new(store.clone());
        Self {
            store,
            generator,
            delivery,
            sms,
            logger,
            retry,
        }
    }

    pub fn logger(&self) -> &OutcomeLogger {
        &self.logger
    }

    /// Runs the whole workflow for one validated trigger.
    pub async fn run(&self, run_id: Uuid, request: ProcessJobRequest) -> RunOutcome {
        let span = info_span!("pipeline_run", %run_id, user_id = %request.user_id);
        let started = Instant::now();

        let mut outcome = self.execute(run_id, &request).instrument(span).await;
        outcome.execution_time_ms = started.elapsed().as_millis() as u64;

        let ctx = LogContext {
            user_id: Some(request.user_id),
            application_id: outcome.application_id,
            job_offer_id: outcome.job_offer_id.or(request.existing_job_id()),
            metadata: Some(json!({
                "run_id": run_id,
                "status": outcome.status.map(|s| s.as_str()),
                "email_sent": outcome.email_sent,
                "execution_time_ms": outcome.execution_time_ms,
                "error": outcome.error,
            })),
        };
        match &outcome.error {
            None => {
                self.logger
                    .success(LogEvent::JobProcessed, "Job processed", ctx)
                    .await
            }
            Some(e) => {
                self.logger
                    .error(LogEvent::JobProcessed, format!("Job processing stopped: {e}"), ctx)
                    .await
            }
        }

        outcome
    }

    async fn execute(&self, run_id: Uuid, request: &ProcessJobRequest) -> RunOutcome {
        let mut outcome = RunOutcome::new(run_id);
        let user_id = request.user_id;

        self.logger
            .info(
                LogEvent::JobReceived,
                format!("Job received for user {user_id}"),
                LogContext::user(user_id).with_metadata(json!({
                    "run_id": run_id,
                    "has_job_id": request.existing_job_id().is_some(),
                    "has_details": matches!(request.job, JobReference::Inline(_)),
                })),
            )
            .await;

        // User + CV
        let (user, cv) = match self.store.get_user_with_latest_cv(user_id).await {
            Ok(found) => found,
            Err(e) => {
                let message = if e.is_not_found() {
                    format!("User or CV not found for user {user_id}")
                } else {
                    format!("Could not load user {user_id}: {e}")
                };
                self.logger
                    .error(LogEvent::UserFetched, message.clone(), LogContext::user(user_id))
                    .await;
                self.notify(user_id, None, NotificationKind::Failed, &message).await;
                return outcome.fail(message);
            }
        };
        self.logger
            .info(
                LogEvent::CvFetched,
                format!("User {} with CV {}", user.full_name, cv.id),
                LogContext::user(user_id).with_metadata(json!({
                    "cv_id": cv.id,
                    "experience_years": cv.experience_years,
                })),
            )
            .await;

        // Job offer
        let offer = match self.resolve_offer(&request.job).await {
            Ok(offer) => offer,
            Err(message) => {
                self.logger
                    .error(LogEvent::OfferFetched, message.clone(), LogContext::user(user_id))
                    .await;
                self.notify(user_id, None, NotificationKind::Failed, &message).await;
                return outcome.fail(message);
            }
        };
        outcome.job_offer_id = Some(offer.id);
        let ctx = LogContext::user(user_id).with_job_offer(offer.id);
        self.logger
            .info(
                LogEvent::OfferFetched,
                format!("Offer {} at {}", offer.title, offer.company),
                ctx.clone(),
            )
            .await;

        // Draft application
        let draft = NewApplication {
            user_id,
            cv_id: cv.id,
            job_offer_id: offer.id,
            cover_letter: DRAFT_LETTER.to_string(),
            status: ApplicationStatus::Processing,
        };
        let application_id = match self.store.create_application(&draft).await {
            Ok(application) => application.id,
            Err(e) => {
                let message = format!("Could not create the application: {e}");
                self.logger
                    .error(LogEvent::ApplicationCreated, message.clone(), ctx)
                    .await;
                return outcome.fail(message);
            }
        };
        let ctx = ctx.with_application(application_id);
        self.logger
            .success(
                LogEvent::ApplicationCreated,
                format!("Application {application_id} created (processing)"),
                ctx.clone(),
            )
            .await;

        let mut outcome = RunOutcome {
            application_id: Some(application_id),
            status: Some(ApplicationStatus::Processing),
            ..outcome
        };

        // Generation
        let letter = match self.generate_letter(&user, &offer, &cv, &ctx).await {
            Ok(letter) => letter,
            Err((message, attempts)) => {
                let update = ApplicationUpdate {
                    retry_count: Some(attempts as i32),
                    error_message: Some(Some(message.clone())),
                    ..status_update(ApplicationStatus::Processing, ApplicationStatus::Failed)
                };
                if let Err(e) = self.store.update_application(application_id, &update).await {
                    error!("Could not mark application {} failed: {}", application_id, e);
                } else {
                    outcome.status = Some(ApplicationStatus::Failed);
                }
                self.logger
                    .error(
                        LogEvent::AiFailed,
                        format!("Generation failed after {attempts} attempts"),
                        ctx.clone().with_metadata(json!({"error": message, "attempts": attempts})),
                    )
                    .await;
                self.notify(
                    user_id,
                    Some(application_id),
                    NotificationKind::Failed,
                    &format!(
                        "Cover letter generation failed for \"{}\" after {} attempts. Error: {}",
                        offer.title, attempts, message
                    ),
                )
                .await;
                return outcome.fail(message);
            }
        };

        // Persist letter
        let update = ApplicationUpdate {
            cover_letter: Some(letter.body.clone()),
            error_message: Some(None),
            ..status_update(ApplicationStatus::Processing, ApplicationStatus::Pending)
        };
        if let Err(e) = self.store.update_application(application_id, &update).await {
            let message = format!("Could not save the cover letter: {e}");
            self.logger
                .error(LogEvent::ApplicationFailed, message.clone(), ctx.clone())
                .await;
            self.notify(
                user_id,
                Some(application_id),
                NotificationKind::Failed,
                &format!("Could not save the cover letter for \"{}\". Error: {}", offer.title, e),
            )
            .await;
            return outcome.fail(message);
        }
        self.logger
            .info(
                LogEvent::StatusChanged,
                "Application moved to pending",
                ctx.clone().with_metadata(json!({"from": "processing", "to": "pending"})),
            )
            .await;
        outcome.status = Some(ApplicationStatus::Pending);
        outcome.subject = Some(letter.subject.clone());
        outcome.cover_letter = Some(letter.body.clone());

        // Email
        let email = if user.auto_send_enabled {
            self.send_email(&user, &cv, &offer, &letter, request, &ctx, &mut outcome)
                .await
        } else {
            debug!("Auto-send disabled; leaving application pending");
            self.notify(
                user_id,
                Some(application_id),
                NotificationKind::Generated,
                &format!(
                    "Your cover letter for \"{}\" at {} is ready for review.",
                    offer.title, offer.company
                ),
            )
            .await;
            EmailOutcome::Skipped
        };

        // SMS
        let sms_status = match email {
            EmailOutcome::Sent => SmsStatus::Sent,
            EmailOutcome::Failed => SmsStatus::Failed,
            EmailOutcome::Skipped => SmsStatus::Pending,
        };
        self.send_sms(&user, &offer, sms_status, &ctx).await;

        outcome
    }

    async fn resolve_offer(&self, job: &JobReference) -> Result<JobOffer, String> {
        match job {
            JobReference::Existing(id) => self.store.get_job_offer(*id).await.map_err(|e| {
                if e.is_not_found() {
                    format!("Job offer {id} not found")
                } else {
                    format!("Could not load job offer {id}: {e}")
                }
            }),
            JobReference::Inline(details) => self
                .store
                .create_or_get_job_offer(details)
                .await
                .map_err(|e| {
                    format!(
                        "Could not create the job offer \"{}\" at {}: {}",
                        details.title, details.company, e
                    )
                }),
        }
    }

    /// Returns the letter, or the last error text and the number of attempts made.
    async fn generate_letter(
        &self,
        user: &User,
        offer: &JobOffer,
        cv: &Cv,
        ctx: &LogContext,
    ) -> Result<CoverLetter, (String, u32)> {
        let application_id = ctx.application_id;
        self.logger
            .info(
                LogEvent::AiCalled,
                "Requesting cover letter",
                ctx.clone()
                    .with_metadata(json!({"max_attempts": self.retry.max_attempts})),
            )
            .await;

        let result = with_retry(
            &self.retry,
            |e: &GenerationError| e.is_retryable(),
            move |attempt| self.record_retry(application_id, ctx, attempt),
            move |attempt| async move {
                let result = self.generator.generate(user, offer, cv).await;
                if let Err(e) = &result {
                    self.logger
                        .warning(
                            LogEvent::AiFailed,
                            format!("Generation attempt {attempt} failed: {e}"),
                            ctx.clone()
                                .with_metadata(json!({"attempt": attempt, "error": e.to_string()})),
                        )
                        .await;
                }
                result
            },
        )
        .await;

        match result {
            Ok(retried) => {
                self.logger
                    .success(
                        LogEvent::AiSuccess,
                        format!("Cover letter generated (attempt {})", retried.attempts),
                        ctx.clone().with_metadata(json!({
                            "attempt": retried.attempts,
                            "subject": retried.value.subject,
                            "word_count": retried.value.word_count(),
                        })),
                    )
                    .await;
                Ok(retried.value)
            }
            Err(failure) => Err((failure.last_error.to_string(), failure.attempts)),
        }
    }

    /// Stamps the upcoming retry on the application before it runs.
    async fn record_retry(&self, application_id: Option<Uuid>, ctx: &LogContext, attempt: u32) {
        self.logger
            .warning(
                LogEvent::RetryAttempted,
                format!("Attempt {}/{}", attempt, self.retry.max_attempts),
                ctx.clone().with_metadata(json!({"attempt": attempt})),
            )
            .await;

        let Some(application_id) = application_id else {
            return;
        };
        let update = ApplicationUpdate {
            retry_count: Some(attempt as i32 - 1),
            last_retry_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.store.update_application(application_id, &update).await {
            warn!("Could not record retry on application {}: {}", application_id, e);
        }
    }

    /// Sends in its own task so a panic in the transport cannot take the run down.
    #[allow(clippy::too_many_arguments)]
    async fn send_email(
        &self,
        user: &User,
        cv: &Cv,
        offer: &JobOffer,
        letter: &CoverLetter,
        request: &ProcessJobRequest,
        ctx: &LogContext,
        outcome: &mut RunOutcome,
    ) -> EmailOutcome {
        let Some(application_id) = ctx.application_id else {
            return EmailOutcome::Skipped;
        };

        let delivery = self.delivery.clone();
        let task_offer = offer.clone();
        let file_ref = cv.file_url.clone();
        let body = letter.body.clone();
        let sender = Sender::from(user);
        let recipient = request.recipient_email.clone();

        let handle = tokio::spawn(async move {
            delivery
                .send(&task_offer, &file_ref, &body, &sender, recipient.as_deref())
                .await
        });

        let error = match handle.await {
            Ok(Ok(sent)) => {
                outcome.email_sent = true;
                self.logger
                    .success(
                        LogEvent::EmailSent,
                        format!("Email sent to {}", sent.recipient),
                        ctx.clone().with_metadata(json!({
                            "message_id": sent.message_id,
                            "to": sent.recipient,
                        })),
                    )
                    .await;

                let update = ApplicationUpdate {
                    applied_at: Some(Utc::now()),
                    ..status_update(ApplicationStatus::Pending, ApplicationStatus::Sent)
                };
                match self.store.update_application(application_id, &update).await {
                    Ok(()) => {
                        outcome.status = Some(ApplicationStatus::Sent);
                        self.logger
                            .info(
                                LogEvent::StatusChanged,
                                "Application moved to sent",
                                ctx.clone().with_metadata(json!({"from": "pending", "to": "sent"})),
                            )
                            .await;
                    }
                    Err(e) => {
                        self.logger
                            .error(
                                LogEvent::ApplicationFailed,
                                format!("Email sent but status update failed: {e}"),
                                ctx.clone(),
                            )
                            .await;
                    }
                }

                self.notify(
                    user.id,
                    Some(application_id),
                    NotificationKind::Sent,
                    &format!("Application sent for \"{}\" at {}.", offer.title, offer.company),
                )
                .await;
                return EmailOutcome::Sent;
            }
            Ok(Err(e)) => e.to_string(),
            Err(join_error) => format!("email task aborted: {join_error}"),
        };

        self.logger
            .warning(
                LogEvent::EmailFailed,
                format!("Email could not be sent: {error}"),
                ctx.clone().with_metadata(json!({"error": error})),
            )
            .await;
        self.notify(
            user.id,
            Some(application_id),
            NotificationKind::EmailFailed,
            &format!(
                "The cover letter for \"{}\" was generated but the email could not be sent. Error: {}",
                offer.title, error
            ),
        )
        .await;
        EmailOutcome::Failed
    }

    async fn send_sms(&self, user: &User, offer: &JobOffer, status: SmsStatus, ctx: &LogContext) {
        let Some(phone) = user.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
            debug!("User has no phone number; skipping SMS");
            return;
        };

        match self.sms.notify(phone, status, &offer.title, &offer.company).await {
            Ok(sid) => {
                self.logger
                    .success(
                        LogEvent::SmsSent,
                        "SMS notification sent",
                        ctx.clone().with_metadata(json!({"sid": sid})),
                    )
                    .await
            }
            Err(SmsError::Disabled) => debug!("SMS disabled; skipping notification"),
            Err(e) => {
                self.logger
                    .warning(
                        LogEvent::SmsFailed,
                        format!("SMS not sent: {e}"),
                        ctx.clone(),
                    )
                    .await
            }
        }
    }

    async fn notify(
        &self,
        user_id: Uuid,
        application_id: Option<Uuid>,
        kind: NotificationKind,
        message: &str,
    ) {
        let notification = NewNotification {
            user_id,
            application_id,
            kind,
            message: message.to_string(),
        };
        if let Err(e) = self.store.create_notification(&notification).await {
            error!("Could not write {} notification for user {}: {}", kind.as_str(), user_id, e);
        }
    }
}
