//! Error types for cell operations.

use thiserror::Error;

/// Errors surfaced through a cell operation's future.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CellError {
    /// The last handle to the cell was dropped before the queued operation
    /// started, or the lane task is no longer running.
    #[error("cell was dropped before the queued operation ran")]
    Deinitialized,
}
