pub mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ObservabilityError::Config("sample rate out of range".to_string());
        assert_eq!(err.to_string(), "Configuration error: sample rate out of range");

        let err = ObservabilityError::Metrics("listener bind failed".to_string());
        assert_eq!(err.to_string(), "Metrics backend error: listener bind failed");

        let err = ObservabilityError::Tracing("exporter unreachable".to_string());
        assert_eq!(err.to_string(), "Trace backend error: exporter unreachable");

        let err = ObservabilityError::Logging("subscriber already set".to_string());
        assert_eq!(err.to_string(), "Logging initialization failed: subscriber already set");
    }

    #[test]
    fn test_figment_errors_map_to_config() {
        let err: ObservabilityError = figment::Error::from("missing field `level`".to_string()).into();
        assert!(matches!(err, ObservabilityError::Config(_)));
        assert!(err.to_string().contains("missing field"));
    }
}
