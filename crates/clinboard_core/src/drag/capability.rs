//! Drag capability tags attached to draggable entities.

use crate::model::column::ColumnId;
use crate::model::task::TaskId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Tag string for column draggables.
pub const CAPABILITY_COLUMN: &str = "Column";
/// Tag string for task draggables.
pub const CAPABILITY_TASK: &str = "Task";

/// Role an entity plays in drag-and-drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityTag {
    Column,
    Task,
}

impl CapabilityTag {
    /// Stable string used by the presentation layer.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Column => CAPABILITY_COLUMN,
            Self::Task => CAPABILITY_TASK,
        }
    }
}

/// Parses one capability tag from its presentation-layer string.
pub fn parse_capability_tag(value: &str) -> Result<CapabilityTag, CapabilityTagError> {
    match value.trim() {
        "" => Err(CapabilityTagError::Empty),
        CAPABILITY_COLUMN => Ok(CapabilityTag::Column),
        CAPABILITY_TASK => Ok(CapabilityTag::Task),
        other => Err(CapabilityTagError::Unsupported(other.to_string())),
    }
}

/// Capability tag parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityTagError {
    Empty,
    Unsupported(String),
}

impl Display for CapabilityTagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "capability tag must not be empty"),
            Self::Unsupported(value) => write!(f, "unsupported capability tag: {value}"),
        }
    }
}

impl Error for CapabilityTagError {}

/// An entity reference together with its capability tag.
///
/// Used both for the drag source and for drop targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Draggable {
    Column(ColumnId),
    Task(TaskId),
}

impl Draggable {
    pub fn tag(&self) -> CapabilityTag {
        match self {
            Self::Column(_) => CapabilityTag::Column,
            Self::Task(_) => CapabilityTag::Task,
        }
    }

    /// Builds a draggable from a tag string and an entity id.
    pub fn from_tagged(tag: &str, id: &str) -> Result<Self, CapabilityTagError> {
        Ok(match parse_capability_tag(tag)? {
            CapabilityTag::Column => Self::Column(ColumnId::new(id)),
            CapabilityTag::Task => Self::Task(TaskId::new(id)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_capability_tag, CapabilityTag, CapabilityTagError, Draggable};
    use crate::model::task::TaskId;

    #[test]
    fn tags_round_trip_through_strings() {
        for tag in [CapabilityTag::Column, CapabilityTag::Task] {
            assert_eq!(parse_capability_tag(tag.as_str()), Ok(tag));
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert_eq!(parse_capability_tag("  "), Err(CapabilityTagError::Empty));
        assert_eq!(
            parse_capability_tag("Slide"),
            Err(CapabilityTagError::Unsupported("Slide".to_string()))
        );
    }

    #[test]
    fn tagged_draggable_keeps_entity_kind() {
        let draggable = Draggable::from_tagged("Task", "t1").expect("tag should parse");
        assert_eq!(draggable, Draggable::Task(TaskId::new("t1")));
        assert_eq!(draggable.tag(), CapabilityTag::Task);
    }
}
