//! Board effects and the reducer that applies them.
//!
//! # Responsibility
//! - Describe intended transitions (`Effect`) independently of how they
//!   were triggered (drag gesture or explicit intent).
//! - Apply them deterministically (`reduce` / `try_reduce`).

pub mod effect;
pub mod reducer;
