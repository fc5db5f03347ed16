//! Tracking operations: one per intercepted database call
//!
//! A [`TrackingOperation`] is opened right before the wrapped call and closed
//! right after it. Opening starts a client span named after the call; closing
//! records exactly one latency measurement and ends the span.
//!
//! ```text
//!   start ──► [enter_scope ──► wrapped call ──► record_exception?] ──► end
//!   OPEN                                                               CLOSED
//! ```
//!
//! Closing is idempotent and also happens on drop, so an operation abandoned
//! by an early return or a panic is still closed exactly once. An operation
//! dropped during a panic without a recorded error is closed as failed. Failures in the
//! stats pipeline are contained inside [`TrackingOperation::end`]; they never
//! reach the caller and never keep the span open.

use std::borrow::Cow;
use std::fmt::Display;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, ContextGuard, KeyValue};
use opentelemetry_sdk::trace::Tracer;

use super::recorder::StatsRegistry;
use super::tags::{CallStatus, TagContextExt};

/// Span attribute holding the SQL text of a statement
pub const SQL_ATTRIBUTE: &str = "sql";

/// Span attribute naming the database product
pub const DB_SYSTEM_ATTRIBUTE: &str = "db.system";

/// Error description recorded for an operation dropped while its call panicked
pub const PANICKED: &str = "panicked";

/// Settings shared by every operation started from one facade
#[derive(Debug, Clone, Default)]
pub(crate) struct OperationSettings {
    pub db_system: Option<String>,
    pub slow_call_threshold: Option<Duration>,
}

pub struct TrackingOperation {
    method: Cow<'static, str>,
    started: Instant,
    cx: Context,
    stats: Arc<StatsRegistry>,
    recorded_error: Option<String>,
    slow_call_threshold: Option<Duration>,
    closed: bool,
}

impl TrackingOperation {
    pub(crate) fn start(
        tracer: &Tracer,
        stats: Arc<StatsRegistry>,
        settings: &OperationSettings,
        parent: &Context,
        method: Cow<'static, str>,
        sql: Option<&str>,
    ) -> Self {
        let mut attributes = Vec::with_capacity(2);
        if let Some(system) = &settings.db_system {
            attributes.push(KeyValue::new(DB_SYSTEM_ATTRIBUTE, system.clone()));
        }
        if let Some(sql) = sql {
            attributes.push(KeyValue::new(SQL_ATTRIBUTE, sql.to_string()));
        }

        let span = tracer
            .span_builder(method.clone())
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start_with_context(tracer, parent);

        Self {
            method,
            started: Instant::now(),
            cx: parent.with_span(span),
            stats,
            recorded_error: None,
            slow_call_threshold: settings.slow_call_threshold,
            closed: false,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Context carrying this operation's span, for starting child operations
    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Make this operation's span the current one until the scope is dropped.
    ///
    /// The scope does not end the span, and the operation cannot be ended while
    /// a scope borrowed from it is alive.
    pub fn enter_scope(&self) -> TraceScope<'_> {
        TraceScope {
            _guard: self.cx.clone().attach(),
            _operation: PhantomData,
        }
    }

    /// Mark the call as failed with `err`'s description.
    ///
    /// A later call overwrites an earlier one. Ignored once the operation is
    /// closed.
    pub fn record_exception<E: Display + ?Sized>(&mut self, err: &E) {
        if self.closed {
            tracing::debug!(method = %self.method, "Operation already closed, exception not recorded");
            return;
        }

        self.recorded_error = Some(err.to_string());
    }

    pub fn recorded_error(&self) -> Option<&str> {
        self.recorded_error.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Hex trace id of the operation's span, `None` if the span is invalid
    pub fn trace_id(&self) -> Option<String> {
        let span = self.cx.span();
        let span_context = span.span_context();

        if span_context.is_valid() {
            Some(format!("{:032x}", span_context.trace_id()))
        } else {
            None
        }
    }

    /// Record the latency measurement and end the span. Runs at most once.
    pub fn end(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let recorded = panic::catch_unwind(AssertUnwindSafe(|| self.record_measurement()));
        if recorded.is_err() {
            tracing::warn!(method = %self.method, "Failed to record latency measurement");
        }

        let span = self.cx.span();
        // Status is written once, at close: the SDK never lowers an error status.
        if let Some(description) = &self.recorded_error {
            span.set_status(Status::error(description.clone()));
        }
        span.end();
    }

    fn record_measurement(&self) {
        let elapsed = self.started.elapsed();
        let latency_ms = elapsed.as_nanos() as f64 / 1e6;

        let tags = self
            .cx
            .tag_context()
            .to_builder()
            .outcome(&self.method, self.recorded_error.as_deref())
            .build();

        self.stats.record_latency(latency_ms, &tags);

        let status = match self.recorded_error {
            Some(_) => CallStatus::Error,
            None => CallStatus::Ok,
        };

        if let Some(threshold) = self.slow_call_threshold {
            if elapsed > threshold {
                tracing::warn!(
                    method = %self.method,
                    latency_ms,
                    threshold_ms = threshold.as_secs_f64() * 1000.0,
                    status = status.as_str(),
                    "Slow database call"
                );
            }
        }

        tracing::debug!(
            method = %self.method,
            latency_ms,
            status = status.as_str(),
            "Database call recorded"
        );
    }
}

impl Drop for TrackingOperation {
    fn drop(&mut self) {
        if std::thread::panicking() && self.recorded_error.is_none() && !self.closed {
            self.recorded_error = Some(PANICKED.to_string());
        }
        self.end();
    }
}

impl std::fmt::Debug for TrackingOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingOperation")
            .field("method", &self.method)
            .field("recorded_error", &self.recorded_error)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Guard returned by [`TrackingOperation::enter_scope`]
pub struct TraceScope<'a> {
    _guard: ContextGuard,
    _operation: PhantomData<&'a TrackingOperation>,
}
