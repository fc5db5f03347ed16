use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::observability::options::TraceOptions;
use crate::observability::tags::TagKey;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[garde(dive)]
    #[serde(default)]
    pub logging: LoggingConfig,

    #[garde(dive)]
    #[serde(default)]
    pub tracing: TracingConfig,

    #[garde(dive)]
    #[serde(default)]
    pub metrics: MetricsConfig,

    #[garde(skip)]
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

fn default_service_name() -> String {
    "dbtrace".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingConfig::default(),
            tracing: TracingConfig::default(),
            metrics: MetricsConfig::default(),
            annotation: AnnotationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoggingConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String, // trace, debug, info, warn, error

    #[garde(pattern(r"^(json|pretty)$"))]
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TracingConfig {
    /// Export spans over OTLP. When off, spans are still created locally.
    #[garde(skip)]
    #[serde(default)]
    pub enabled: bool,

    #[garde(length(min = 1))]
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,

    #[garde(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    #[garde(range(min = 1, max = 300))]
    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,

    /// Value of the `db.system` span attribute, e.g. "postgresql"
    #[garde(skip)]
    #[serde(default)]
    pub db_system: Option<String>,
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_sample_rate() -> f64 {
    1.0
}

fn default_export_timeout() -> u64 {
    10
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
            sample_rate: default_sample_rate(),
            export_timeout_secs: default_export_timeout(),
            db_system: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct MetricsConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Serve `/metrics` on this address, e.g. "0.0.0.0:9090"
    #[garde(custom(validate_listen_address))]
    #[serde(default)]
    pub listen: Option<String>,

    /// Tag keys grouped by the latency views on top of method, error and status
    #[garde(custom(validate_extra_tag_keys))]
    #[serde(default)]
    pub extra_tag_keys: Vec<String>,

    #[garde(skip)]
    #[serde(default)]
    pub slow_call_threshold_ms: Option<u64>,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            listen: None,
            extra_tag_keys: Vec::new(),
            slow_call_threshold_ms: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AnnotationConfig {
    #[serde(default)]
    pub options: TraceOptions,
}

fn validate_listen_address(value: &Option<String>, _: &()) -> garde::Result {
    match value {
        Some(addr) => addr
            .parse::<std::net::SocketAddr>()
            .map(|_| ())
            .map_err(|_| garde::Error::new("Invalid socket address")),
        None => Ok(()),
    }
}

fn validate_extra_tag_keys(value: &[String], _: &()) -> garde::Result {
    for key in value {
        if key.is_empty() {
            return Err(garde::Error::new("Tag keys must not be empty"));
        }
        if TagKey::is_reserved(key) {
            return Err(garde::Error::new(format!("Tag key {} is always grouped by", key)));
        }
    }
    Ok(())
}
