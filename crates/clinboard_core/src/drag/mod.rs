//! Drag-and-drop gesture interpretation.
//!
//! # Responsibility
//! - Classify draggables by capability tag.
//! - Turn gesture start/over/end events into board effects.
//!
//! Any concrete gesture-recognition library plugs in by feeding these events.

pub mod capability;
pub mod session;
