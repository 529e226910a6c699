//! Process-wide request counters and a latency EWMA, exposed at `/v1/metrics`.
//!
//! Every field here lives behind one mutex rather than independent atomics:
//! the EWMA update needs to read and write the running average atomically
//! with the event that triggered it, and separate atomics can't give that
//! without their own lock anyway.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// How much weight a single new observation carries in the running average.
const EWMA_ALPHA: f64 = 0.01;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub search_total: u64,
    pub search_err: u64,
    pub feedback_total: u64,
    pub index_total: u64,
    pub avg_search_ms: f64,
}

struct Inner {
    snapshot: StatsSnapshot,
}

/// Shared counters and latency average, updated under a single mutex.
pub struct StatsTracker {
    inner: Mutex<Inner>,
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                snapshot: StatsSnapshot::default(),
            }),
        }
    }

    /// Record one completed search, its duration, and whether it errored.
    pub fn record_search(&self, duration_ms: f64, errored: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.snapshot.search_total += 1;
        if errored {
            inner.snapshot.search_err += 1;
        }
        let avg = inner.snapshot.avg_search_ms;
        inner.snapshot.avg_search_ms = (1.0 - EWMA_ALPHA) * avg + EWMA_ALPHA * duration_ms;
    }

    pub fn record_feedback(&self) {
        self.inner.lock().unwrap().snapshot.feedback_total += 1;
    }

    pub fn record_index(&self, count: u64) {
        self.inner.lock().unwrap().snapshot.index_total += count;
    }

    /// A point-in-time copy of the counters, safe to serialize and hand to
    /// a caller without holding the lock.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().unwrap().snapshot.clone()
    }
}
