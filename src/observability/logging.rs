//! Log output layers
//!
//! Two formats are supported:
//! - "json": structured JSON lines, with the current span attached
//! - "pretty": human-readable output for development
//!
//! `RUST_LOG` takes precedence over the configured level when set.

use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, Layer, registry::LookupSpan};

use crate::config::LoggingConfig;
use crate::error::{ObservabilityError, Result};

/// Level filter from `RUST_LOG`, falling back to `config.level`
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level).map_err(|e| {
        ObservabilityError::Config(format!("Invalid log level {}: {}", config.level, e))
    })
}

/// Formatting layer for `config.format`
pub fn fmt_layer<S>(config: &LoggingConfig) -> Result<Box<dyn Layer<S> + Send + Sync>>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    match config.format.as_str() {
        "json" => Ok(tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()),
        "pretty" => Ok(tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .boxed()),
        other => Err(ObservabilityError::Config(format!(
            "Unsupported log format: {}. Use 'json' or 'pretty'",
            other
        ))),
    }
}
