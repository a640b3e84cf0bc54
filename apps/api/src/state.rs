use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::pipeline::Pipeline;
use crate::store::RecordStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Read access for the log endpoints.
    pub store: Arc<dyn RecordStore>,
    /// Reported by the webhook health check (`APP_ENV`).
    pub environment: String,
    pub started_at: DateTime<Utc>,
}
