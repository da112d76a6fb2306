//! Error types for cache operations.

use thiserror::Error;
use turnstile_cell::CellError;

/// Errors surfaced through [`with_value`](crate::RefreshingCache::with_value).
///
/// The refresh error type is generic so a caller's own failure propagates
/// verbatim, never wrapped in a string.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// The cache's inner cell is gone (its lane stopped mid-operation).
    #[error(transparent)]
    Cell(#[from] CellError),

    /// The refresh function failed. The slot keeps its pre-refresh state and
    /// the next call retries.
    #[error("refresh failed: {0}")]
    Refresh(E),
}
