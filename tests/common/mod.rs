#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dbtrace::config::MetricsConfig;
use dbtrace::observability::{Observability, StatsRegistry};
use futures::future::BoxFuture;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::trace::TracerProvider;

#[derive(Debug, Clone, Default)]
pub struct CollectingExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl SpanExporter for CollectingExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        self.spans.lock().unwrap().extend(batch);
        Box::pin(std::future::ready(Ok(())))
    }
}

/// Facade over a local provider and an isolated Prometheus registry
pub struct TestTelemetry {
    pub observability: Observability,
    exporter: CollectingExporter,
    _provider: TracerProvider,
}

impl TestTelemetry {
    pub fn new() -> Self {
        let exporter = CollectingExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();

        let config = MetricsConfig {
            environment: "test".to_string(),
            ..Default::default()
        };
        let stats = Arc::new(StatsRegistry::prometheus(&config, "dbtrace-it").unwrap());
        let observability = Observability::from_provider(&provider, stats);
        assert!(observability.register_metric_views());

        Self {
            observability,
            exporter,
            _provider: provider,
        }
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.spans.lock().unwrap().clone()
    }

    pub fn render(&self) -> String {
        self.observability.stats().render()
    }

    /// Value of the first exposition line of `metric` whose labels include
    /// every entry of `labels`
    pub fn sample(&self, metric: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let prefix = format!("{}{{", metric);
        self.render()
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .find(|line| {
                labels
                    .iter()
                    .all(|(k, v)| line.contains(&format!("{}=\"{}\"", k, v)))
            })
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }
}

pub fn attribute(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}
