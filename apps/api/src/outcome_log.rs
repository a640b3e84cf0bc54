//! Outcome Logger: append-only run events in the `logs` table, mirrored to
//! `tracing`. Writes are best-effort; a failed write is reported to tracing and
//! swallowed.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::log_entry::{LogEvent, LogLevel, NewLogEntry};
use crate::store::RecordStore;

const LOG_SOURCE: &str = "backend";

/// Which records an event relates to, plus free-form metadata.
#[derive(Debug, Clone, Default)]
pub struct LogContext {
    pub user_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub job_offer_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

impl LogContext {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn with_application(mut self, application_id: Uuid) -> Self {
        self.application_id = Some(application_id);
        self
    }

    pub fn with_job_offer(mut self, job_offer_id: Uuid) -> Self {
        self.job_offer_id = Some(job_offer_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Clone)]
pub struct OutcomeLogger {
    store: Arc<dyn RecordStore>,
}

impl OutcomeLogger {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn info(&self, event: LogEvent, message: impl Into<String>, ctx: LogContext) {
        self.write(LogLevel::Info, event, message.into(), ctx).await
    }

    pub async fn success(&self, event: LogEvent, message: impl Into<String>, ctx: LogContext) {
        self.write(LogLevel::Success, event, message.into(), ctx).await
    }

    pub async fn warning(&self, event: LogEvent, message: impl Into<String>, ctx: LogContext) {
        self.write(LogLevel::Warning, event, message.into(), ctx).await
    }

    pub async fn error(&self, event: LogEvent, message: impl Into<String>, ctx: LogContext) {
        self.write(LogLevel::Error, event, message.into(), ctx).await
    }

    pub async fn write(&self, level: LogLevel, event: LogEvent, message: String, ctx: LogContext) {
        match level {
            LogLevel::Info | LogLevel::Success => info!(event = event.as_str(), "{}", message),
            LogLevel::Warning => warn!(event = event.as_str(), "{}", message),
            LogLevel::Error => error!(event = event.as_str(), "{}", message),
        }

        let entry = NewLogEntry {
            user_id: ctx.user_id,
            application_id: ctx.application_id,
            job_offer_id: ctx.job_offer_id,
            level,
            event,
            message,
            metadata: ctx.metadata,
            source: LOG_SOURCE,
        };

        if let Err(e) = self.store.append_log(&entry).await {
            warn!("Failed to persist log entry {}: {}", event.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::memory::{FailPoint, MemoryStore};

    #[tokio::test]
    async fn test_entry_carries_context_and_source() {
        let store = Arc::new(MemoryStore::new());
        let logger = OutcomeLogger::new(store.clone());
        let user_id = Uuid::new_v4();
        let application_id = Uuid::new_v4();

        logger
            .success(
                LogEvent::EmailSent,
                "Email sent",
                LogContext::user(user_id)
                    .with_application(application_id)
                    .with_metadata(json!({"recipient": "jobs@acme.test"})),
            )
            .await;

        let logs = store.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].level, "success");
        assert_eq!(logs[0].event, "email_sent");
        assert_eq!(logs[0].source, "backend");
        assert_eq!(logs[0].user_id, Some(user_id));
        assert_eq!(logs[0].application_id, Some(application_id));
        assert_eq!(logs[0].metadata.as_ref().unwrap()["recipient"], "jobs@acme.test");
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        store.fail_on(FailPoint::AppendLog);
        let logger = OutcomeLogger::new(store.clone());

        logger
            .error(LogEvent::ApplicationFailed, "boom", LogContext::default())
            .await;

        assert!(store.logs().is_empty());
    }
}
