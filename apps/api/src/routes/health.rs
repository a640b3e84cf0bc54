use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0);
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_seconds": uptime
    }))
}

/// GET /api/webhook/health
pub async fn webhook_health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "API is running",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": state.environment
    }))
}

/// GET /
pub async fn index_handler() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "webhook_health": "GET /api/webhook/health",
            "process_job": "POST /api/webhook/process-job",
            "process_job_sync": "POST /api/webhook/process-job/sync",
            "logs": "GET /api/v1/logs?user_id=",
            "log_stats": "GET /api/v1/logs/stats?user_id=",
            "application_logs": "GET /api/v1/applications/:id/logs"
        }
    }))
}
