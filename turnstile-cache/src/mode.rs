//! Cache refresh policy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Refresh policy for a [`RefreshingCache`](crate::RefreshingCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheMode {
    /// A background timer refreshes the slot every interval, regardless of
    /// access volume. Reads never re-check freshness themselves.
    Periodic(Duration),
    /// The slot is refreshed lazily, on access, once it is older than the
    /// given maximum age (or still empty).
    NeedBased(Duration),
}

impl CacheMode {
    /// The interval or maximum age carried by the mode.
    pub fn duration(&self) -> Duration {
        match self {
            CacheMode::Periodic(interval) => *interval,
            CacheMode::NeedBased(max_age) => *max_age,
        }
    }

    /// Whether this mode drives a background refresh timer.
    pub fn is_periodic(&self) -> bool {
        matches!(self, CacheMode::Periodic(_))
    }
}
