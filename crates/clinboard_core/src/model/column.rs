//! Column domain model.
//!
//! # Responsibility
//! - Define the ordered lane record that owns tasks on a board.
//!
//! # Invariants
//! - `id` is unique among the columns of one board.
//! - `id` is stable for the column lifetime, except when a temporary client
//!   id is reconciled into the server-assigned one.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Opaque column identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    /// Wraps an existing identifier (server-assigned or imported).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh client-side id with the given temporary prefix.
    pub fn temporary(prefix: &str) -> Self {
        Self(format!("{prefix}{}", Uuid::new_v4()))
    }

    /// Returns whether this id still carries the temporary prefix.
    pub fn is_temporary(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ColumnId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ColumnId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One board column. Position in `BoardState::columns` is its display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: ColumnId,
    /// User-editable display title.
    pub title: String,
}

impl Column {
    pub fn new(id: impl Into<ColumnId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}
