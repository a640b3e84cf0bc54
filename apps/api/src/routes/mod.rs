pub mod health;
pub mod logs;
pub mod webhook;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::index_handler))
        .route("/health", get(health::health_handler))
        // Trigger API
        .route("/api/webhook/health", get(health::webhook_health_handler))
        .route("/api/webhook/process-job", post(webhook::handle_process_job))
        .route(
            "/api/webhook/process-job/sync",
            post(webhook::handle_process_job_sync),
        )
        // Outcome log API
        .route("/api/v1/logs", get(logs::handle_user_logs))
        .route("/api/v1/logs/stats", get(logs::handle_log_stats))
        .route(
            "/api/v1/applications/:id/logs",
            get(logs::handle_application_logs),
        )
        .with_state(state)
}
