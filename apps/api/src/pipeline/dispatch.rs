//! Detaches pipeline runs from the request that triggered them.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use super::{Pipeline, ProcessJobRequest, RejectionReason};
use crate::models::log_entry::LogEvent;
use crate::outcome_log::LogContext;

impl Pipeline {
    /// Spawns the run and returns its id immediately. A supervisor task reports
    /// runs that end by panicking.
    pub fn submit(self: &Arc<Self>, request: ProcessJobRequest) -> Uuid {
        let run_id = Uuid::new_v4();
        let pipeline = Arc::clone(self);

        let worker = tokio::spawn(async move { pipeline.run(run_id, request).await });

        tokio::spawn(async move {
            match worker.await {
                Ok(outcome) => info!(
                    "Run {} finished: status={:?} email_sent={} in {}ms",
                    run_id,
                    outcome.status.map(|s| s.as_str()),
                    outcome.email_sent,
                    outcome.execution_time_ms
                ),
                Err(e) => error!("Run {} aborted: {}", run_id, e),
            }
        });

        run_id
    }

    /// Records a rejected trigger without holding up the response.
    pub fn reject(self: &Arc<Self>, reason: &RejectionReason, body: &Value) {
        let pipeline = Arc::clone(self);
        let user_id = body
            .get("user_id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s.trim()).ok());
        let message = format!("Trigger rejected: {reason}");
        let metadata = json!({"code": reason.code(), "provided": body});

        tokio::spawn(async move {
            let ctx = LogContext {
                user_id,
                metadata: Some(metadata),
                ..Default::default()
            };
            pipeline
                .logger()
                .error(LogEvent::JobReceived, message, ctx)
                .await;
        });
    }
}
