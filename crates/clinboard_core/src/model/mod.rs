//! Board entity model.
//!
//! # Responsibility
//! - Define column/task records and the board aggregate that owns them.
//!
//! # Invariants
//! - Every entity belongs to exactly one board aggregate.
//! - Every task belongs to exactly one column of that aggregate.

pub mod board;
pub mod column;
pub mod task;
