//! Collaborators of the surrounding features.
//!
//! Neither module touches board state directly; research results become
//! ordinary `CreateTask` effects submitted through the sync coordinator.

pub mod generate;
pub mod research;
