//! Stats backend handle
//!
//! [`StatsRegistry`] owns the recorder that latency measurements are written
//! into and the views registered over it. It never installs a global
//! recorder: every write goes through [`metrics::with_local_recorder`], so
//! several registries can coexist in one process (one per test, for example).
//!
//! The production backend is a Prometheus recorder with the latency
//! distribution buckets attached and service-level global labels. Any other
//! [`metrics::Recorder`] can be plugged in with [`StatsRegistry::new`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{Label, Recorder, counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use super::measures::{Aggregation, ViewDefinition, all_views};
use super::tags::TagContext;
use crate::config::MetricsConfig;
use crate::error::{ObservabilityError, Result};

pub struct StatsRegistry {
    recorder: Arc<dyn Recorder + Send + Sync>,
    handle: Option<PrometheusHandle>,
    views: Vec<ViewDefinition>,
    registered: AtomicBool,
}

impl StatsRegistry {
    /// Wrap an arbitrary recorder. Views are defined but not yet registered.
    pub fn new(recorder: Arc<dyn Recorder + Send + Sync>, extra_tag_keys: &[String]) -> Self {
        Self {
            recorder,
            handle: None,
            views: all_views(extra_tag_keys),
            registered: AtomicBool::new(false),
        }
    }

    /// Build a Prometheus-backed registry.
    ///
    /// With `config.listen` set, `/metrics` is also served over HTTP; that
    /// requires a running Tokio runtime.
    pub fn prometheus(config: &MetricsConfig, service_name: &str) -> Result<Self> {
        let views = all_views(&config.extra_tag_keys);

        let mut builder = PrometheusBuilder::new()
            .add_global_label("service", service_name)
            .add_global_label("environment", &config.environment);

        for view in &views {
            if let Aggregation::Distribution(bounds) = view.aggregation {
                builder = builder.set_buckets_for_metric(Matcher::Full(view.name.to_string()), bounds)?;
            }
        }

        let recorder = match &config.listen {
            Some(listen) => {
                let addr: SocketAddr = listen.parse().map_err(|e| {
                    ObservabilityError::Config(format!("Invalid metrics listen address {}: {}", listen, e))
                })?;
                let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                    ObservabilityError::Metrics("Prometheus HTTP listener requires a Tokio runtime".to_string())
                })?;

                let (recorder, exporter) = builder.with_http_listener(addr).build()?;
                runtime.spawn(async move {
                    if exporter.await.is_err() {
                        tracing::error!("Prometheus HTTP listener stopped");
                    }
                });

                tracing::info!(listen = %addr, "Prometheus metrics endpoint listening");
                recorder
            }
            None => builder.build_recorder(),
        };

        let handle = recorder.handle();

        tracing::info!(
            service = %service_name,
            environment = %config.environment,
            views = views.len(),
            "Prometheus stats registry created"
        );

        Ok(Self {
            recorder: Arc::new(recorder),
            handle: Some(handle),
            views,
            registered: AtomicBool::new(false),
        })
    }

    /// Register the latency views with the backend.
    ///
    /// Only the first call has an effect; it returns `true`.
    pub fn register_views(&self) -> bool {
        if self
            .registered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Latency views already registered");
            return false;
        }

        metrics::with_local_recorder(self.recorder.as_ref(), || {
            for view in &self.views {
                match view.aggregation {
                    Aggregation::Distribution(_) => {
                        describe_histogram!(view.name, view.unit, view.description)
                    }
                    Aggregation::Count => describe_counter!(view.name, view.unit, view.description),
                }
            }
        });

        tracing::info!(
            views = ?self.views.iter().map(|v| v.name).collect::<Vec<_>>(),
            "Latency views registered"
        );
        true
    }

    pub fn views_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub fn views(&self) -> &[ViewDefinition] {
        &self.views
    }

    /// Record one latency measurement into every view.
    ///
    /// Each view keeps only the tags it groups by. Nothing is aggregated
    /// before the views are registered.
    pub fn record_latency(&self, latency_ms: f64, tags: &TagContext) {
        if !self.views_registered() {
            tracing::debug!(latency_ms, "Latency views not registered, measurement dropped");
            return;
        }

        metrics::with_local_recorder(self.recorder.as_ref(), || {
            for view in &self.views {
                let labels: Vec<Label> = tags
                    .iter()
                    .filter(|(key, _)| view.groups_by(key))
                    .map(|(key, value)| Label::new(key.to_string(), value.to_string()))
                    .collect();

                match view.aggregation {
                    Aggregation::Distribution(_) => histogram!(view.name, labels).record(latency_ms),
                    Aggregation::Count => counter!(view.name, labels).increment(1),
                }
            }
        });
    }

    /// Prometheus text exposition, empty for non-Prometheus backends
    pub fn render(&self) -> String {
        self.handle.as_ref().map(PrometheusHandle::render).unwrap_or_default()
    }
}

impl std::fmt::Debug for StatsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRegistry")
            .field("prometheus", &self.handle.is_some())
            .field("views", &self.views)
            .field("registered", &self.views_registered())
            .finish_non_exhaustive()
    }
}
