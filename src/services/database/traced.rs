//! Tracing decorator for [`SqlClient`]
//!
//! Every call is delegated to the inner client inside a tracking operation
//! named `SqlClient.<method>`. Results and errors pass through unchanged.

use opentelemetry::Context;

use super::{Row, SqlClient};
use crate::observability::{Observability, TraceOptions};

pub mod methods {
    pub const EXECUTE: &str = "SqlClient.execute";
    pub const QUERY: &str = "SqlClient.query";
    pub const EXECUTE_BATCH: &str = "SqlClient.execute_batch";
    pub const COMMIT: &str = "SqlClient.commit";
    pub const ROLLBACK: &str = "SqlClient.rollback";
    pub const CLOSE: &str = "SqlClient.close";
    pub const IS_CLOSED: &str = "SqlClient.is_closed";
}

#[derive(Debug)]
pub struct TracedClient<C> {
    inner: C,
    observability: Observability,
    annotate_sql: bool,
}

impl<C: SqlClient> TracedClient<C> {
    /// Wrap `inner`. Whether SQL text is attached to spans is decided here,
    /// once, from `options`.
    pub fn new(inner: C, observability: Observability, options: &TraceOptions) -> Self {
        Self {
            inner,
            observability,
            annotate_sql: Observability::should_annotate_with_payload(options),
        }
    }

    pub fn annotates_sql(&self) -> bool {
        self.annotate_sql
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: SqlClient> SqlClient for TracedClient<C> {
    type Error = C::Error;

    fn execute(&mut self, sql: &str) -> Result<u64, Self::Error> {
        let inner = &mut self.inner;
        self.observability
            .track_statement(methods::EXECUTE, self.annotate_sql, sql, || inner.execute(sql))
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, Self::Error> {
        let inner = &mut self.inner;
        self.observability
            .track_statement(methods::QUERY, self.annotate_sql, sql, || inner.query(sql))
    }

    fn execute_batch(&mut self, statements: &[String]) -> Result<Vec<u64>, Self::Error> {
        let inner = &mut self.inner;
        let payload = self.annotate_sql.then(|| statements.join(";\n"));
        self.observability.track_in(
            &Context::current(),
            methods::EXECUTE_BATCH,
            payload.as_deref(),
            || inner.execute_batch(statements),
        )
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        let inner = &mut self.inner;
        self.observability.track(methods::COMMIT, || inner.commit())
    }

    fn rollback(&mut self) -> Result<(), Self::Error> {
        let inner = &mut self.inner;
        self.observability.track(methods::ROLLBACK, || inner.rollback())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        let inner = &mut self.inner;
        self.observability.track(methods::CLOSE, || inner.close())
    }

    fn is_closed(&self) -> bool {
        let mut operation = self.observability.start_operation(methods::IS_CLOSED);
        let closed = {
            let _scope = operation.enter_scope();
            self.inner.is_closed()
        };
        operation.end();
        closed
    }
}
