//! Tracing subscriber initialization.
//!
//! Output is JSON in production and human-readable text in development,
//! selected by `SAFECONNECT_LOG_FORMAT`. Filtering follows `RUST_LOG`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ApiError, ApiResult};

const DEFAULT_FILTER: &str = "safeconnect_api=debug,tower_http=info,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Logging configuration from environment variables.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
    pub service_name: String,
    pub environment: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_filter: DEFAULT_FILTER.to_string(),
            service_name: "safeconnect-api".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl LogConfig {
    /// Environment variables:
    /// - `SAFECONNECT_LOG_FORMAT`: "json" or "pretty" (default: pretty)
    /// - `SAFECONNECT_ENVIRONMENT`: deployment name (default: development)
    pub fn from_env() -> Self {
        let format = match std::env::var("SAFECONNECT_LOG_FORMAT")
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self {
            format,
            environment: std::env::var("SAFECONNECT_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            ..Self::default()
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup before anything logs.
pub fn init_tracing(config: &LogConfig) -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };
    result.map_err(|e| ApiError::internal_error(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(
        service_name = %config.service_name,
        environment = %config.environment,
        format = ?config.format,
        "Logging initialized"
    );

    Ok(())
}
