//! Turnstile Cell - Single-Lane Exclusive Access
//!
//! This crate provides [`ExclusiveCell`], a container that owns one mutable
//! value and serializes every read and mutation through a single lane (a
//! FIFO queue drained by one task per cell).
//!
//! # Architecture
//!
//! ```text
//! handle ── submit(op) ──┐
//! handle ── submit(op) ──┼──→ [ lane queue ] ──→ lane task ──→ &mut value
//! handle ── get()/set() ─┘        (FIFO)          (one op at a time)
//! ```
//!
//! - Execution is logically single-threaded per cell; different cells run
//!   fully independently.
//! - An operation that awaits internally holds the lane until its future
//!   resolves — nothing else observes the value in between.
//! - The lane task keeps only a weak back-reference to the handle state.
//!   When the last handle drops, queued-but-unstarted operations fail with
//!   [`CellError::Deinitialized`] rather than run against a value nobody can
//!   reach anymore.
//!
//! # Key Types
//!
//! - [`ExclusiveCell`]: cloneable handle to the lane and its value
//! - [`LaneOp`]: trait seam for operations whose internal await borrows the
//!   value (closure conveniences cover the common cases)
//! - [`CellError`]: failure surfaced when a queued operation can no longer run

mod cell;
mod error;

pub use cell::{ExclusiveCell, LaneOp};
pub use error::CellError;
