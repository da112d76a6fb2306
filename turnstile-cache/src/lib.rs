//! Turnstile Cache - Single-Slot Refreshing Cache
//!
//! This crate provides [`RefreshingCache`], a wrapper around one
//! expensive-to-compute value that refreshes it lazily or periodically and
//! serializes all access to the cached copy through a single
//! [`ExclusiveCell`] lane.
//!
//! # Refresh policies
//!
//! - [`CacheMode::NeedBased`]: the slot is refreshed on access, only when it
//!   is empty or older than the configured maximum age. The refresh runs as
//!   part of the accessing call's lane turn, so concurrent callers queue
//!   behind one refresh and all observe the same fresh value.
//! - [`CacheMode::Periodic`]: a background timer unconditionally replaces
//!   the slot every interval; reads use whatever is in the slot and never
//!   re-check its age. Tick failures are logged and swallowed.
//!
//! Either way the slot moves `Empty → Populated` once and stays populated;
//! a failed refresh leaves it exactly as it was, so the cache is always
//! retryable and never poisoned.
//!
//! # Key Types
//!
//! - [`RefreshingCache`]: the cache itself ([`with_value`] /
//!   [`with_value_async`] entry points)
//! - [`CacheMode`]: the two-variant refresh policy
//! - [`CacheError`]: cell failure or the caller's own refresh error,
//!   propagated verbatim
//! - [`RefreshStats`]: per-instance refresh/hit counters
//!
//! [`with_value`]: RefreshingCache::with_value
//! [`with_value_async`]: RefreshingCache::with_value_async

mod cache;
mod error;
mod mode;
mod stats;

pub use cache::RefreshingCache;
pub use error::CacheError;
pub use mode::CacheMode;
pub use stats::{RefreshStats, RefreshStatsSnapshot};

// Re-export the underlying cell types for convenience.
pub use turnstile_cell::{CellError, ExclusiveCell, LaneOp};
