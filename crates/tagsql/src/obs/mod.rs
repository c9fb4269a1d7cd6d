//! Observability: runtime counters and the sink boundary.
//!
//! Structured log events are emitted with `tracing` at the call sites;
//! this module only owns counters.

pub(crate) mod metrics;
pub(crate) mod sink;

// re-exports
pub use metrics::{EventOps, EventReport};
pub use sink::{
    ExecKind, GlobalMetricsSink, MetricsEvent, MetricsSink, metrics_report, metrics_reset_all,
};
