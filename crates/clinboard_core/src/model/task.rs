//! Task domain model.
//!
//! # Responsibility
//! - Define the card record placed inside exactly one column.
//! - Carry opaque metadata across moves without interpreting it.
//!
//! # Invariants
//! - `column_id` always references an existing column of the same board.
//! - Metadata keys are preserved verbatim through every board mutation.

use crate::model::column::ColumnId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Metadata key linking a task to a clinical context (patient, encounter, ...).
pub const META_RELATED_CONTEXT_ID: &str = "relatedContextId";
/// Metadata key describing where a task came from (`research`, `manual`, ...).
pub const META_SOURCE_TYPE: &str = "sourceType";
/// Metadata key for the user-visible flag marker.
pub const META_FLAGGED: &str = "flagged";

/// Opaque task metadata, serialized as a nested `metadata` object.
pub type TaskMetadata = BTreeMap<String, Value>;

/// Opaque task identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
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

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Board task (card).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    /// Owning column. Never dangling while the task exists.
    pub column_id: ColumnId,
    /// User-editable text payload.
    pub content: String,
    /// Carried opaquely: `flagged`, `sourceType`, `relatedContextId`, ...
    #[serde(default, skip_serializing_if = "TaskMetadata::is_empty")]
    pub metadata: TaskMetadata,
}

impl Task {
    /// Creates a task without metadata.
    pub fn new(
        id: impl Into<TaskId>,
        column_id: impl Into<ColumnId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            column_id: column_id.into(),
            content: content.into(),
            metadata: TaskMetadata::new(),
        }
    }

    /// Returns the related context id when the metadata carries a string value.
    pub fn related_context_id(&self) -> Option<&str> {
        self.metadata
            .get(META_RELATED_CONTEXT_ID)
            .and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskId, META_FLAGGED, META_RELATED_CONTEXT_ID};
    use serde_json::json;

    #[test]
    fn metadata_is_nested_on_the_wire() {
        let mut task = Task::new("t1", "todo", "call pharmacy");
        task.metadata.insert(META_FLAGGED.to_string(), json!(true));
        task.metadata
            .insert(META_RELATED_CONTEXT_ID.to_string(), json!("patient-7"));

        let value = serde_json::to_value(&task).expect("should serialize");
        assert_eq!(value["columnId"], "todo");
        assert_eq!(value["metadata"]["flagged"], true);
        assert_eq!(value["metadata"]["relatedContextId"], "patient-7");
        assert!(value.get("flagged").is_none());

        let decoded: Task = serde_json::from_value(value).expect("should deserialize");
        assert_eq!(decoded, task);
        assert_eq!(decoded.related_context_id(), Some("patient-7"));
    }

    #[test]
    fn non_string_context_is_ignored() {
        let mut task = Task::new("t1", "todo", "x");
        task.metadata
            .insert(META_RELATED_CONTEXT_ID.to_string(), json!(42));
        assert_eq!(task.related_context_id(), None);
    }

    #[test]
    fn metadata_keys_may_shadow_task_fields() {
        let mut task = Task::new("t1", "todo", "real content");
        task.metadata.insert("content".to_string(), json!("opaque"));
        task.metadata.insert("id".to_string(), json!("not-the-id"));
        task.metadata.insert("columnId".to_string(), json!(3));

        let raw = serde_json::to_string(&task).expect("should serialize");
        let decoded: Task = serde_json::from_str(&raw).expect("should deserialize");
        assert_eq!(decoded, task);
        assert_eq!(decoded.content, "real content");
        assert_eq!(decoded.id, TaskId::new("t1"));
        assert_eq!(decoded.metadata["content"], "opaque");
    }

    #[test]
    fn missing_metadata_decodes_empty() {
        let decoded: Task =
            serde_json::from_str(r#"{"id":"t1","columnId":"todo","content":"x"}"#)
                .expect("should deserialize");
        assert!(decoded.metadata.is_empty());
        assert_eq!(
            serde_json::to_value(&decoded).expect("should serialize").get("metadata"),
            None
        );
    }

    #[test]
    fn owned_string_converts_into_task_id() {
        let id: TaskId = String::from("srv-9").into();
        assert_eq!(id.as_str(), "srv-9");
    }
}
