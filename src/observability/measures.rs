//! Measure and view definitions for database call latency
//!
//! One measure is recorded per tracked call: its latency in milliseconds.
//! Two views aggregate it:
//! - `sql_client_latency_milliseconds`: distribution over [`LATENCY_BUCKETS_MS`]
//! - `sql_client_calls_total`: number of calls
//!
//! Both views group by `method`, `error` and `status`, plus any extra tag keys
//! configured on the registry.

use metrics::Unit;

use super::tags::TagKey;

/// Name of the latency measure
pub const MEASURE_LATENCY: &str = "sql_client_latency";

pub const MEASURE_LATENCY_DESCRIPTION: &str = "The latency of database client calls in milliseconds";

pub const LATENCY_VIEW: &str = "sql_client_latency_milliseconds";

pub const CALLS_VIEW: &str = "sql_client_calls_total";

/// Distribution boundaries in milliseconds, 0 ms up to 500 s
pub const LATENCY_BUCKETS_MS: [f64; 31] = [
    0.0, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 1.5, 2.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0,
    200.0, 400.0, 600.0, 800.0, 1000.0, 1500.0, 2000.0, 2500.0, 5000.0, 10000.0, 20000.0,
    40000.0, 100000.0, 200000.0, 500000.0,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    /// Histogram over fixed bucket boundaries
    Distribution(&'static [f64]),
    Count,
}

/// An aggregation of the latency measure grouped by a fixed set of tag keys
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub measure: &'static str,
    pub unit: Unit,
    pub aggregation: Aggregation,
    pub tag_keys: Vec<String>,
}

impl ViewDefinition {
    /// Whether a tag with this key survives aggregation in this view
    pub fn groups_by(&self, key: &str) -> bool {
        self.tag_keys.iter().any(|k| k == key)
    }
}

fn grouping_keys(extra_tag_keys: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = TagKey::ALL.iter().map(|k| k.as_str().to_string()).collect();
    for key in extra_tag_keys {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }
    keys
}

pub fn latency_view(extra_tag_keys: &[String]) -> ViewDefinition {
    ViewDefinition {
        name: LATENCY_VIEW,
        description: "The distribution of latencies of database client calls",
        measure: MEASURE_LATENCY,
        unit: Unit::Milliseconds,
        aggregation: Aggregation::Distribution(&LATENCY_BUCKETS_MS),
        tag_keys: grouping_keys(extra_tag_keys),
    }
}

pub fn calls_view(extra_tag_keys: &[String]) -> ViewDefinition {
    ViewDefinition {
        name: CALLS_VIEW,
        description: "The number of database client calls",
        measure: MEASURE_LATENCY,
        unit: Unit::Count,
        aggregation: Aggregation::Count,
        tag_keys: grouping_keys(extra_tag_keys),
    }
}

/// All views defined over the latency measure
pub fn all_views(extra_tag_keys: &[String]) -> Vec<ViewDefinition> {
    vec![latency_view(extra_tag_keys), calls_view(extra_tag_keys)]
}
