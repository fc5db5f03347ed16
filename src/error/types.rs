use thiserror::Error;

/// Failures of the observability pipeline itself.
///
/// Database errors never pass through this type; wrapped calls hand them back
/// to the caller untouched.
#[derive(Error, Debug)]
pub enum ObservabilityError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics backend error: {0}")]
    Metrics(String),

    #[error("Trace backend error: {0}")]
    Tracing(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, ObservabilityError>;

impl From<figment::Error> for ObservabilityError {
    fn from(err: figment::Error) -> Self {
        ObservabilityError::Config(err.to_string())
    }
}

impl From<garde::Report> for ObservabilityError {
    fn from(report: garde::Report) -> Self {
        ObservabilityError::Config(report.to_string())
    }
}

impl From<metrics_exporter_prometheus::BuildError> for ObservabilityError {
    fn from(err: metrics_exporter_prometheus::BuildError) -> Self {
        ObservabilityError::Metrics(err.to_string())
    }
}

impl From<opentelemetry::trace::TraceError> for ObservabilityError {
    fn from(err: opentelemetry::trace::TraceError) -> Self {
        ObservabilityError::Tracing(err.to_string())
    }
}
