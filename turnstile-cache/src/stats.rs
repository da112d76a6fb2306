//! Refresh statistics counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking refresh activity for one cache instance.
#[derive(Debug, Default)]
pub struct RefreshStats {
    /// Refresh attempts started, lazy and periodic alike.
    pub refreshes_attempted: AtomicU64,

    /// Refresh attempts that stored a fresh value.
    pub refreshes_succeeded: AtomicU64,

    /// Refresh attempts that failed.
    pub refreshes_failed: AtomicU64,

    /// Calls served from the existing slot without refreshing.
    pub cache_hits: AtomicU64,
}

impl RefreshStats {
    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_attempt(&self) {
        self.refreshes_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.refreshes_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.refreshes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Current snapshot of all counters.
    pub fn snapshot(&self) -> RefreshStatsSnapshot {
        RefreshStatsSnapshot {
            refreshes_attempted: self.refreshes_attempted.load(Ordering::Relaxed),
            refreshes_succeeded: self.refreshes_succeeded.load(Ordering::Relaxed),
            refreshes_failed: self.refreshes_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`RefreshStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStatsSnapshot {
    pub refreshes_attempted: u64,
    pub refreshes_succeeded: u64,
    pub refreshes_failed: u64,
    pub cache_hits: u64,
}
