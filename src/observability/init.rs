//! Telemetry initialization
//!
//! Sets up, in order: the trace pipeline (OTLP export or local only), one
//! global subscriber combining log output with the OpenTelemetry bridge, and
//! the Prometheus stats registry with the latency views registered.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{self, Sampler, Tracer, TracerProvider},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use super::facade::{Observability, TRACER_NAME};
use super::logging;
use super::recorder::StatsRegistry;
use crate::config::AppConfig;
use crate::error::{ObservabilityError, Result};

/// Initialized telemetry. Call [`Telemetry::shutdown`] before exiting to
/// flush buffered spans.
#[derive(Debug)]
pub struct Telemetry {
    observability: Observability,
    exporting: bool,
}

impl Telemetry {
    pub fn observability(&self) -> &Observability {
        &self.observability
    }

    pub fn shutdown(self) {
        self.observability.force_flush();
        if self.exporting {
            opentelemetry::global::shutdown_tracer_provider();
        }
        tracing::info!("Telemetry shut down");
    }
}

/// Install the global subscriber and build the facade described by `config`.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: &AppConfig) -> Result<Telemetry> {
    let (tracer, provider) = if config.tracing.enabled {
        (create_otlp_tracer(config)?, None)
    } else {
        let provider = TracerProvider::builder()
            .with_config(trace_config(config))
            .build();
        (provider.tracer(TRACER_NAME), Some(provider))
    };

    tracing_subscriber::registry()
        .with(logging::env_filter(&config.logging)?)
        .with(logging::fmt_layer(&config.logging)?)
        .with(tracing_opentelemetry::layer().with_tracer(tracer.clone()))
        .try_init()
        .map_err(|e| ObservabilityError::Logging(e.to_string()))?;

    let stats = Arc::new(StatsRegistry::prometheus(&config.metrics, &config.service_name)?);

    let mut observability = match &provider {
        Some(provider) => Observability::from_provider(provider, stats),
        None => Observability::new(tracer, stats),
    };
    if let Some(system) = &config.tracing.db_system {
        observability = observability.with_db_system(system.clone());
    }
    if let Some(ms) = config.metrics.slow_call_threshold_ms {
        observability = observability.with_slow_call_threshold(Duration::from_millis(ms));
    }

    observability.register_metric_views();

    tracing::info!(
        service = %config.service_name,
        tracing_enabled = config.tracing.enabled,
        otlp_endpoint = %config.tracing.otlp_endpoint,
        sample_rate = config.tracing.sample_rate,
        log_format = %config.logging.format,
        "Telemetry initialized"
    );

    Ok(Telemetry {
        observability,
        exporting: config.tracing.enabled,
    })
}

fn create_otlp_tracer(config: &AppConfig) -> Result<Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(&config.tracing.otlp_endpoint)
        .with_timeout(Duration::from_secs(config.tracing.export_timeout_secs));

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(trace_config(config))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    Ok(tracer)
}

fn trace_config(config: &AppConfig) -> trace::Config {
    trace::config()
        .with_sampler(Sampler::TraceIdRatioBased(config.tracing.sample_rate))
        .with_resource(service_resource(config))
}

fn service_resource(config: &AppConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        KeyValue::new("deployment.environment", config.metrics.environment.clone()),
        KeyValue::new("telemetry.sdk.name", "opentelemetry"),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ])
}
