//! # Structured Logging Module
//!
//! Environment-aware structured logging for the orchestration core. Worker
//! pools emit per-operation tracing fields; this module wires the subscriber.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; later calls are no-ops. Honors `RUST_LOG`
/// when set, otherwise derives the level from `APP_ENV`.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter),
        );

        // A global subscriber may already be installed by the embedding
        // application; that is not an error.
        if subscriber.try_init().is_err() {
            tracing::debug!("global tracing subscriber already initialized");
        }

        tracing::info!(environment = %environment, "structured logging initialized");
    });
}

/// Get current environment from environment variables.
fn get_environment() -> String {
    std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment.
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
