//! Metrics sink boundary.
//!
//! Compiler, cache and repository code never touch counters directly.
//! All instrumentation flows through `MetricsEvent` and `MetricsSink`.

use crate::obs::metrics::{self, COUNTERS};

///
/// ExecKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecKind {
    Query,
    Write,
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    Compile {
        tag_refs: u64,
        family_fallbacks: u64,
    },
    CacheLookup {
        hits: u64,
        misses: u64,
    },
    CacheWarm {
        entries: u64,
    },
    Execute {
        kind: ExecKind,
        rows: u64,
    },
    StorageFault,
    TagsCreated {
        count: u64,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

///
/// GlobalMetricsSink
///
/// Default sink writing into the process-wide counters.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        let c = &COUNTERS;

        match event {
            MetricsEvent::Compile {
                tag_refs,
                family_fallbacks,
            } => {
                metrics::add(&c.compiles, 1);
                metrics::add(&c.tag_refs, tag_refs);
                metrics::add(&c.family_fallbacks, family_fallbacks);
            }
            MetricsEvent::CacheLookup { hits, misses } => {
                metrics::add(&c.cache_hits, hits);
                metrics::add(&c.cache_misses, misses);
            }
            MetricsEvent::CacheWarm { entries } => {
                metrics::add(&c.cache_warm_entries, entries);
            }
            MetricsEvent::Execute { kind, rows } => match kind {
                ExecKind::Query => {
                    metrics::add(&c.queries, 1);
                    metrics::add(&c.rows_returned, rows);
                }
                ExecKind::Write => {
                    metrics::add(&c.writes, 1);
                    metrics::add(&c.rows_affected, rows);
                }
            },
            MetricsEvent::StorageFault => metrics::add(&c.storage_faults, 1),
            MetricsEvent::TagsCreated { count } => metrics::add(&c.tags_created, count),
        }
    }
}

/// Snapshot the global counters.
#[must_use]
pub fn metrics_report() -> metrics::EventReport {
    metrics::report()
}

/// Reset the global counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}
