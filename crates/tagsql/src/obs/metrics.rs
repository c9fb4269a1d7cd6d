use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

///
/// EventOps
///
/// Counter snapshot. Every field is monotonic between resets.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventOps {
    // Compilation
    pub compiles: u64,
    pub tag_refs: u64,
    pub family_fallbacks: u64,

    // Cache
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_warm_entries: u64,

    // Executor
    pub queries: u64,
    pub writes: u64,
    pub rows_returned: u64,
    pub rows_affected: u64,
    pub storage_faults: u64,

    // Tag lifecycle
    pub tags_created: u64,
}

///
/// EventReport
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EventReport {
    pub ops: EventOps,
}

///
/// Counters
///
/// Process-wide atomics; shared by every repository using the global sink.
///

pub(crate) struct Counters {
    pub compiles: AtomicU64,
    pub tag_refs: AtomicU64,
    pub family_fallbacks: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_warm_entries: AtomicU64,
    pub queries: AtomicU64,
    pub writes: AtomicU64,
    pub rows_returned: AtomicU64,
    pub rows_affected: AtomicU64,
    pub storage_faults: AtomicU64,
    pub tags_created: AtomicU64,
}

impl Counters {
    const fn new() -> Self {
        Self {
            compiles: AtomicU64::new(0),
            tag_refs: AtomicU64::new(0),
            family_fallbacks: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_warm_entries: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            rows_returned: AtomicU64::new(0),
            rows_affected: AtomicU64::new(0),
            storage_faults: AtomicU64::new(0),
            tags_created: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 12] {
        [
            &self.compiles,
            &self.tag_refs,
            &self.family_fallbacks,
            &self.cache_hits,
            &self.cache_misses,
            &self.cache_warm_entries,
            &self.queries,
            &self.writes,
            &self.rows_returned,
            &self.rows_affected,
            &self.storage_faults,
            &self.tags_created,
        ]
    }
}

pub(crate) static COUNTERS: Counters = Counters::new();

/// Saturating add; counters never wrap.
pub(crate) fn add(counter: &AtomicU64, delta: u64) {
    if delta == 0 {
        return;
    }
    // the closure always returns Some, so the update cannot fail
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_add(delta))
    });
}

/// Snapshot every counter.
pub(crate) fn report() -> EventReport {
    let c = &COUNTERS;
    let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);

    EventReport {
        ops: EventOps {
            compiles: load(&c.compiles),
            tag_refs: load(&c.tag_refs),
            family_fallbacks: load(&c.family_fallbacks),
            cache_hits: load(&c.cache_hits),
            cache_misses: load(&c.cache_misses),
            cache_warm_entries: load(&c.cache_warm_entries),
            queries: load(&c.queries),
            writes: load(&c.writes),
            rows_returned: load(&c.rows_returned),
            rows_affected: load(&c.rows_affected),
            storage_faults: load(&c.storage_faults),
            tags_created: load(&c.tags_created),
        },
    }
}

/// Reset all counters (useful in tests).
pub(crate) fn reset_all() {
    for counter in COUNTERS.all() {
        counter.store(0, Ordering::Relaxed);
    }
}
