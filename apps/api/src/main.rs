mod config;
mod db;
mod delivery;
mod errors;
mod files;
mod letter;
mod llm_client;
mod models;
mod outcome_log;
mod pipeline;
mod retry;
mod routes;
mod sms;
mod state;
mod store;
#[cfg(test)]
mod testing;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::delivery::{build_transport, DeliveryClient};
use crate::files::S3FileStore;
use crate::letter::LlmLetterGenerator;
use crate::llm_client::LlmClient;
use crate::pipeline::Pipeline;
use crate::retry::RetryPolicy;
use crate::routes::build_router;
use crate::sms::{SmsNotifier, SmsSender, TwilioSms};
use crate::state::AppState;
use crate::store::PgStore;

const TRANSPORT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http=info",
                env!("CARGO_CRATE_NAME"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Recruiter API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(db));

    // Initialize S3 / MinIO (CV files)
    let s3 = build_s3_client(&config).await;
    let files = Arc::new(S3FileStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized (bucket: {})", config.s3_bucket);

    // Initialize letter generation
    let llm = LlmClient::new(config.groq_api_key.clone(), config.groq_model.clone());
    info!("LLM client initialized (model: {})", llm.model());
    let generator = Arc::new(LlmLetterGenerator::new(llm));

    // Email delivery: disabled rather than fatal when misconfigured
    let transport = build_transport(&config.email).unwrap_or_else(|e| {
        warn!("Email transport misconfigured, delivery disabled: {e}");
        None
    });
    let delivery = DeliveryClient::new(transport, files);
    if delivery.is_enabled() {
        match delivery.verify(TRANSPORT_VERIFY_TIMEOUT).await {
            Ok(()) => info!(
                "Email transport verified ({})",
                delivery.transport_name().unwrap_or_default()
            ),
            Err(e) => warn!("Email transport verification failed, sends may fail: {e}"),
        }
    }

    // SMS notifications
    let sms = match &config.sms {
        Some(settings) => match TwilioSms::new(settings) {
            Ok(twilio) => {
                let sender: Arc<dyn SmsSender> = Arc::new(twilio);
                SmsNotifier::new(Some(sender), config.sms_default_country_code.clone())
            }
            Err(e) => {
                warn!("SMS disabled: {e}");
                SmsNotifier::disabled()
            }
        },
        None => {
            warn!("Twilio credentials not configured; SMS disabled");
            SmsNotifier::disabled()
        }
    };
    if sms.is_enabled() {
        info!(
            "SMS notifications enabled (default country code +{})",
            config.sms_default_country_code
        );
    }

    let retry = RetryPolicy::new(
        config.generation_max_attempts,
        Duration::from_millis(config.generation_backoff_ms),
    );
    let pipeline = Arc::new(Pipeline::new(store.clone(), generator, delivery, sms, retry));

    // Build app state
    let state = AppState {
        pipeline,
        store,
        environment: config.app_env.clone(),
        started_at: Utc::now(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "recruiter-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("Shutting down gracefully...");
}
