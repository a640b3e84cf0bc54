use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::log_entry::{LogEntry, LogLevel, LogPage, LogQuery, LogStats};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Deserialize)]
pub struct UserLogsQuery {
    pub user_id: Uuid,
    pub level: Option<LogLevel>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/logs
pub async fn handle_user_logs(
    State(state): State<AppState>,
    Query(params): Query<UserLogsQuery>,
) -> Result<Json<LogPage>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    let offset = params.offset.unwrap_or(0);
    if offset < 0 {
        return Err(AppError::Validation("offset must not be negative".to_string()));
    }

    let query = LogQuery {
        level: params.level,
        limit,
        offset,
    };
    Ok(Json(state.store.list_user_logs(params.user_id, &query).await?))
}

/// GET /api/v1/logs/stats
pub async fn handle_log_stats(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<LogStats>, AppError> {
    Ok(Json(state.store.log_stats(params.user_id).await?))
}

/// GET /api/v1/applications/:id/logs
pub async fn handle_application_logs(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    state.store.get_application(application_id).await?;
    Ok(Json(state.store.list_application_logs(application_id).await?))
}
