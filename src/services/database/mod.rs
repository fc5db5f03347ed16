//! Database client abstraction
//!
//! [`SqlClient`] is the call surface the instrumentation wraps. The crate
//! ships an in-memory [`MockDatabase`] implementation and the tracing
//! decorator [`TracedClient`].

use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

pub mod traced;

pub use traced::TracedClient;

/// One result row, column values in select order
pub type Row = Vec<Value>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("{0}")]
    Failed(String),

    #[error("Connection is closed")]
    Closed,

    #[error("Timeout occurred: {0}")]
    Timeout(String),
}

/// Synchronous SQL client
///
/// # Example
///
/// ```rust
/// # use dbtrace::services::database::{MockDatabase, SqlClient};
/// let mut db = MockDatabase::new();
/// assert_eq!(db.execute("INSERT INTO t VALUES (1)").unwrap(), 1);
/// db.commit().unwrap();
/// ```
pub trait SqlClient {
    type Error: Display;

    /// Run a statement, returning the number of affected rows
    fn execute(&mut self, sql: &str) -> Result<u64, Self::Error>;

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, Self::Error>;

    /// Run statements in order, stopping at the first failure
    fn execute_batch(&mut self, statements: &[String]) -> Result<Vec<u64>, Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;

    fn rollback(&mut self) -> Result<(), Self::Error>;

    fn close(&mut self) -> Result<(), Self::Error>;

    fn is_closed(&self) -> bool;
}

/// In-memory client with scripted results
#[derive(Debug, Default)]
pub struct MockDatabase {
    rows: HashMap<String, Vec<Row>>,
    failures: HashMap<String, ClientError>,
    latency: Option<Duration>,
    executed: Vec<String>,
    pending: usize,
    commits: usize,
    rollbacks: usize,
    closed: bool,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `rows` for queries matching `sql` exactly
    pub fn with_rows(mut self, sql: impl Into<String>, rows: Vec<Row>) -> Self {
        self.rows.insert(sql.into(), rows);
        self
    }

    /// Fail statements matching `sql` exactly with `error`
    pub fn fail_on(mut self, sql: impl Into<String>, error: ClientError) -> Self {
        self.failures.insert(sql.into(), error);
        self
    }

    /// Sleep this long in every statement
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Statements run so far, including failed ones
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    fn run(&mut self, sql: &str) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        self.executed.push(sql.to_string());
        match self.failures.get(sql) {
            Some(error) => Err(error.clone()),
            None => {
                self.pending += 1;
                Ok(())
            }
        }
    }
}

impl SqlClient for MockDatabase {
    type Error = ClientError;

    fn execute(&mut self, sql: &str) -> Result<u64, ClientError> {
        self.run(sql)?;
        Ok(1)
    }

    fn query(&mut self, sql: &str) -> Result<Vec<Row>, ClientError> {
        self.run(sql)?;
        Ok(self.rows.get(sql).cloned().unwrap_or_default())
    }

    fn execute_batch(&mut self, statements: &[String]) -> Result<Vec<u64>, ClientError> {
        statements.iter().map(|sql| self.execute(sql)).collect()
    }

    fn commit(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        self.pending = 0;
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        self.pending = 0;
        self.rollbacks += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ClientError> {
        if self.pending > 0 {
            tracing::debug!(pending = self.pending, "Closing with uncommitted statements");
        }
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
