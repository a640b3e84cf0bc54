use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::pipeline::normalize;
use crate::state::AppState;

/// POST /api/webhook/process-job
///
/// Validates and acknowledges; the run continues in the background. Rejected
/// payloads still get a 200 so the calling automation does not retry them.
pub async fn handle_process_job(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Json<Value> {
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);

    match normalize(&body) {
        Ok(request) => {
            let run_id = state.pipeline.submit(request);
            info!("Accepted job trigger (run {})", run_id);
            Json(json!({
                "success": true,
                "accepted": true,
                "run_id": run_id,
                "message": "Job accepted for processing"
            }))
        }
        Err(reason) => {
            warn!("Rejected job trigger: {}", reason);
            state.pipeline.reject(&reason, &body);
            Json(json!({
                "success": false,
                "accepted": false,
                "code": reason.code(),
                "error": reason.to_string()
            }))
        }
    }
}

/// POST /api/webhook/process-job/sync
pub async fn handle_process_job_sync(
    State(state): State<AppState>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, AppError> {
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);

    let request = match normalize(&body) {
        Ok(request) => request,
        Err(reason) => {
            state.pipeline.reject(&reason, &body);
            return Err(AppError::Validation(reason.to_string()));
        }
    };

    let outcome = state.pipeline.run(Uuid::new_v4(), request).await;
    Ok(Json(json!({
        "success": outcome.is_success(),
        "run_id": outcome.run_id,
        "application_id": outcome.application_id,
        "status": outcome.status,
        "subject": outcome.subject,
        "cover_letter": outcome.cover_letter,
        "email_sent": outcome.email_sent,
        "execution_time_ms": outcome.execution_time_ms,
        "error": outcome.error
    })))
}
