//! Entry point for instrumenting database calls
//!
//! Wrappers hold an [`Observability`] and call one of the `track*` helpers
//! around each intercepted call, or drive a [`TrackingOperation`] by hand when
//! the call does not fit the closure shape.

use std::borrow::Cow;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::Context;
use opentelemetry::trace::{FutureExt as _, TracerProvider as _};
use opentelemetry_sdk::trace::{Tracer, TracerProvider};

use super::operation::{OperationSettings, TrackingOperation};
use super::options::{TraceOption, TraceOptions};
use super::recorder::StatsRegistry;

/// Instrumentation scope name used for every operation span
pub const TRACER_NAME: &str = "dbtrace";

#[derive(Clone)]
pub struct Observability {
    tracer: Tracer,
    // Tracers only hold a weak reference to their provider; keep it alive
    // when it was handed to us.
    provider: Option<TracerProvider>,
    stats: Arc<StatsRegistry>,
    settings: OperationSettings,
}

impl Observability {
    pub fn new(tracer: Tracer, stats: Arc<StatsRegistry>) -> Self {
        Self {
            tracer,
            provider: None,
            stats,
            settings: OperationSettings::default(),
        }
    }

    pub fn from_provider(provider: &TracerProvider, stats: Arc<StatsRegistry>) -> Self {
        Self {
            tracer: provider.tracer(TRACER_NAME),
            provider: Some(provider.clone()),
            stats,
            settings: OperationSettings::default(),
        }
    }

    /// Tag every span with `db.system`
    pub fn with_db_system(mut self, system: impl Into<String>) -> Self {
        self.settings.db_system = Some(system.into());
        self
    }

    /// Log a warning for calls slower than `threshold`
    pub fn with_slow_call_threshold(mut self, threshold: Duration) -> Self {
        self.settings.slow_call_threshold = Some(threshold);
        self
    }

    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }

    /// Whether statement text may be attached to spans under `options`
    pub fn should_annotate_with_payload(options: &TraceOptions) -> bool {
        options.contains(TraceOption::AnnotateTracesWithSql)
    }

    /// Start an operation as a child of the current context
    pub fn start_operation(&self, method: impl Into<Cow<'static, str>>) -> TrackingOperation {
        self.start_operation_in(&Context::current(), method, None)
    }

    /// Start an operation, attaching `payload` as the `sql` attribute only
    /// when `allow_annotation` is set
    pub fn start_operation_with_payload(
        &self,
        method: impl Into<Cow<'static, str>>,
        allow_annotation: bool,
        payload: &str,
    ) -> TrackingOperation {
        let sql = allow_annotation.then_some(payload);
        self.start_operation_in(&Context::current(), method, sql)
    }

    /// Start an operation under an explicit parent context.
    ///
    /// Ambient tags are read from `parent`. `sql` is attached as given; the
    /// annotation decision is the caller's.
    pub fn start_operation_in(
        &self,
        parent: &Context,
        method: impl Into<Cow<'static, str>>,
        sql: Option<&str>,
    ) -> TrackingOperation {
        TrackingOperation::start(
            &self.tracer,
            self.stats.clone(),
            &self.settings,
            parent,
            method.into(),
            sql,
        )
    }

    /// Register the latency views. Safe to call more than once.
    pub fn register_metric_views(&self) -> bool {
        self.stats.register_views()
    }

    /// Run `call` inside a new operation, recording its error if it fails.
    ///
    /// The call's result is returned unchanged.
    pub fn track<T, E, F>(&self, method: impl Into<Cow<'static, str>>, call: F) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let operation = self.start_operation(method);
        run_tracked(operation, call)
    }

    /// Like [`Observability::track`] for a call that carries SQL text
    pub fn track_statement<T, E, F>(
        &self,
        method: impl Into<Cow<'static, str>>,
        allow_annotation: bool,
        sql: &str,
        call: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let operation = self.start_operation_with_payload(method, allow_annotation, sql);
        run_tracked(operation, call)
    }

    /// Like [`Observability::track`] under an explicit parent context, with
    /// `sql` attached as given
    pub fn track_in<T, E, F>(
        &self,
        parent: &Context,
        method: impl Into<Cow<'static, str>>,
        sql: Option<&str>,
        call: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
    {
        let operation = self.start_operation_in(parent, method, sql);
        run_tracked(operation, call)
    }

    /// Track an async call. The operation's context is current on every poll.
    pub async fn track_future<T, E, F>(
        &self,
        method: impl Into<Cow<'static, str>>,
        sql: Option<&str>,
        future: F,
    ) -> Result<T, E>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        let mut operation = self.start_operation_in(&Context::current(), method, sql);

        let result = future.with_context(operation.context().clone()).await;
        if let Err(e) = &result {
            operation.record_exception(e);
        }
        operation.end();

        result
    }

    /// Flush spans buffered by the provider this facade was built from
    pub fn force_flush(&self) {
        let Some(provider) = &self.provider else {
            return;
        };

        for result in provider.force_flush() {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to flush operation spans");
            }
        }
    }
}

fn run_tracked<T, E, F>(mut operation: TrackingOperation, call: F) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    let result = {
        let _scope = operation.enter_scope();
        call()
    };

    if let Err(e) = &result {
        operation.record_exception(e);
    }
    operation.end();

    result
}

impl std::fmt::Debug for Observability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observability")
            .field("stats", &self.stats)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
