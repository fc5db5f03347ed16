//! Instrumentation of database client calls
//!
//! Every intercepted call becomes a [`TrackingOperation`]: a client span named
//! after the call plus one latency measurement, tagged with the call's method
//! and outcome and aggregated by the views in [`measures`].

pub mod facade;
pub mod init;
pub mod logging;
pub mod measures;
pub mod operation;
pub mod options;
pub mod recorder;
pub mod tags;

#[cfg(test)]
pub(crate) mod test_support;

pub use facade::Observability;
pub use init::{Telemetry, init_telemetry};
pub use operation::{TraceScope, TrackingOperation};
pub use options::{TraceOption, TraceOptions};
pub use recorder::StatsRegistry;
pub use tags::{CallStatus, TagContext, TagContextExt, TagKey};
