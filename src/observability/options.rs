//! Per-connection trace options
//!
//! Options are decided once when a traced client is created and never
//! re-evaluated per call.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOption {
    /// Attach the SQL text of statements to their spans
    AnnotateTracesWithSql,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceOptions(BTreeSet<TraceOption>);

impl TraceOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, option: TraceOption) -> Self {
        self.0.insert(option);
        self
    }

    pub fn contains(&self, option: TraceOption) -> bool {
        self.0.contains(&option)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<TraceOption> for TraceOptions {
    fn from_iter<I: IntoIterator<Item = TraceOption>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
