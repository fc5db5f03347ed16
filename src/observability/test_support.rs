//! Test doubles for the trace and stats backends

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use metrics::{
    Counter, CounterFn, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::trace::TracerProvider;

use super::facade::Observability;
use super::recorder::StatsRegistry;

/// Span exporter that keeps every exported span in memory
#[derive(Debug, Clone, Default)]
pub struct CollectingExporter {
    spans: Arc<Mutex<Vec<SpanData>>>,
}

impl CollectingExporter {
    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.lock().unwrap().clone()
    }
}

impl SpanExporter for CollectingExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        self.spans.lock().unwrap().extend(batch);
        Box::pin(std::future::ready(Ok(())))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl Sample {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct Samples {
    histograms: Vec<Sample>,
    counters: Vec<Sample>,
    described: Vec<String>,
}

/// Recorder that captures every write instead of aggregating
#[derive(Default, Clone)]
pub struct CapturingRecorder {
    samples: Arc<Mutex<Samples>>,
}

impl CapturingRecorder {
    pub fn histogram_samples(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().histograms.clone()
    }

    pub fn counter_increments(&self) -> Vec<Sample> {
        self.samples.lock().unwrap().counters.clone()
    }

    pub fn described(&self) -> Vec<String> {
        self.samples.lock().unwrap().described.clone()
    }
}

struct CapturedMetric {
    name: String,
    labels: Vec<(String, String)>,
    samples: Arc<Mutex<Samples>>,
}

impl CapturedMetric {
    fn new(key: &Key, samples: &Arc<Mutex<Samples>>) -> Self {
        Self {
            name: key.name().to_string(),
            labels: key
                .labels()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect(),
            samples: samples.clone(),
        }
    }

    fn sample(&self, value: f64) -> Sample {
        Sample {
            name: self.name.clone(),
            labels: self.labels.clone(),
            value,
        }
    }
}

impl HistogramFn for CapturedMetric {
    fn record(&self, value: f64) {
        let sample = self.sample(value);
        self.samples.lock().unwrap().histograms.push(sample);
    }
}

impl CounterFn for CapturedMetric {
    fn increment(&self, value: u64) {
        let sample = self.sample(value as f64);
        self.samples.lock().unwrap().counters.push(sample);
    }

    fn absolute(&self, value: u64) {
        self.increment(value);
    }
}

impl Recorder for CapturingRecorder {
    fn describe_counter(&self, key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        self.samples.lock().unwrap().described.push(key.as_str().to_string());
    }

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, key: KeyName, _unit: Option<Unit>, _description: SharedString) {
        self.samples.lock().unwrap().described.push(key.as_str().to_string());
    }

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CapturedMetric::new(key, &self.samples)))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CapturedMetric::new(key, &self.samples)))
    }
}

/// Recorder whose histograms panic, standing in for a broken stats pipeline
#[derive(Default)]
pub struct PanickingRecorder;

struct PanickingHistogram;

impl HistogramFn for PanickingHistogram {
    fn record(&self, _value: f64) {
        panic!("stats backend unavailable");
    }
}

impl Recorder for PanickingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, _key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(PanickingHistogram))
    }
}

/// An [`Observability`] wired to in-memory backends
pub struct Harness {
    pub observability: Observability,
    pub exporter: CollectingExporter,
    pub recorder: CapturingRecorder,
    pub provider: TracerProvider,
}

impl Harness {
    pub fn new() -> Self {
        let recorder = CapturingRecorder::default();
        Self::with_recorder(recorder.clone(), Arc::new(recorder))
    }

    pub fn with_recorder(recorder: CapturingRecorder, backend: Arc<dyn Recorder + Send + Sync>) -> Self {
        let exporter = CollectingExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();

        let stats = Arc::new(StatsRegistry::new(backend, &[]));
        let observability = Observability::from_provider(&provider, stats);
        observability.register_metric_views();

        Self {
            observability,
            exporter,
            recorder,
            provider,
        }
    }

    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter.spans()
    }
}
