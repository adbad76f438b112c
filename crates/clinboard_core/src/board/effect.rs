//! Board effects: descriptions of intended state transitions.
//!
//! # Responsibility
//! - Name every mutation the board reducer understands.
//! - Report which entity ids an effect writes and which it only references,
//!   so the sync layer can lock and order remote calls.
//! - Rewrite ids when a temporary id is reconciled.
//!
//! # Invariants
//! - Effects carry every id they need; `CreateTask`/`CreateColumn` hold the
//!   freshly generated client id so reduction stays deterministic.

use crate::model::board::BoardState;
use crate::model::column::ColumnId;
use crate::model::task::{TaskId, TaskMetadata};
use std::fmt::{Display, Formatter};

/// Target slot for a task inside a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPosition {
    /// Append after the last task of the column.
    End,
    /// Insert at this index of the post-removal sequence (clamped).
    Index(usize),
}

impl TaskPosition {
    pub fn index(self) -> Option<usize> {
        match self {
            Self::End => None,
            Self::Index(index) => Some(index),
        }
    }
}

/// Typed reference to one board entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Column(ColumnId),
    Task(TaskId),
}

impl Display for EntityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Column(id) => write!(f, "column:{id}"),
            Self::Task(id) => write!(f, "task:{id}"),
        }
    }
}

/// Replacement of a temporary id by its canonical server id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdRemap {
    Column { from: ColumnId, to: ColumnId },
    Task { from: TaskId, to: TaskId },
}

impl IdRemap {
    pub fn column(&self, id: &mut ColumnId) {
        if let Self::Column { from, to } = self {
            if id == from {
                *id = to.clone();
            }
        }
    }

    pub fn task(&self, id: &mut TaskId) {
        if let Self::Task { from, to } = self {
            if id == from {
                *id = to.clone();
            }
        }
    }

    pub fn key(&self, key: &mut EntityKey) {
        match key {
            EntityKey::Column(id) => self.column(id),
            EntityKey::Task(id) => self.task(id),
        }
    }
}

/// Intended board transition produced by a gesture or explicit intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreateColumn {
        column_id: ColumnId,
        title: String,
    },
    RenameColumn {
        column_id: ColumnId,
        title: String,
    },
    ReorderColumns {
        from: usize,
        to: usize,
    },
    /// Removes the column and every task it owns.
    DeleteColumn {
        column_id: ColumnId,
    },
    CreateTask {
        task_id: TaskId,
        column_id: ColumnId,
        content: String,
        metadata: TaskMetadata,
        position: TaskPosition,
    },
    UpdateTaskContent {
        task_id: TaskId,
        content: String,
    },
    UpdateTaskMetadata {
        task_id: TaskId,
        metadata: TaskMetadata,
    },
    ReparentTask {
        task_id: TaskId,
        column_id: ColumnId,
        position: TaskPosition,
    },
    /// Drop on another task: reorder within a column or reparent across.
    ReorderOrReparentTask {
        task_id: TaskId,
        column_id: ColumnId,
        index: usize,
    },
    DeleteTask {
        task_id: TaskId,
    },
}

impl Effect {
    /// Builds a column append with a fresh temporary id.
    pub fn create_column(title: impl Into<String>, temp_prefix: &str) -> Self {
        Self::CreateColumn {
            column_id: ColumnId::temporary(temp_prefix),
            title: title.into(),
        }
    }

    /// Builds a task append with a fresh temporary id and no metadata.
    pub fn create_task(column_id: ColumnId, content: impl Into<String>, temp_prefix: &str) -> Self {
        Self::create_task_at(column_id, content, TaskPosition::End, temp_prefix)
    }

    /// Like [`Effect::create_task`], inserting at `position` of the column.
    pub fn create_task_at(
        column_id: ColumnId,
        content: impl Into<String>,
        position: TaskPosition,
        temp_prefix: &str,
    ) -> Self {
        Self::CreateTask {
            task_id: TaskId::temporary(temp_prefix),
            column_id,
            content: content.into(),
            metadata: TaskMetadata::new(),
            position,
        }
    }

    /// Short stable name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateColumn { .. } => "create_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::ReorderColumns { .. } => "reorder_columns",
            Self::DeleteColumn { .. } => "delete_column",
            Self::CreateTask { .. } => "create_task",
            Self::UpdateTaskContent { .. } => "update_task_content",
            Self::UpdateTaskMetadata { .. } => "update_task_metadata",
            Self::ReparentTask { .. } => "reparent_task",
            Self::ReorderOrReparentTask { .. } => "reorder_or_reparent_task",
            Self::DeleteTask { .. } => "delete_task",
        }
    }

    /// Entity created by this effect, if any.
    pub fn created_entity(&self) -> Option<EntityKey> {
        match self {
            Self::CreateColumn { column_id, .. } => Some(EntityKey::Column(column_id.clone())),
            Self::CreateTask { task_id, .. } => Some(EntityKey::Task(task_id.clone())),
            _ => None,
        }
    }

    /// Entities this effect writes, resolved against the pre-effect state.
    ///
    /// `DeleteColumn` writes the column and every task it cascades to.
    /// `ReorderColumns` writes the moved column only.
    pub fn written_entities(&self, state: &BoardState) -> Vec<EntityKey> {
        match self {
            Self::CreateColumn { column_id, .. }
            | Self::RenameColumn { column_id, .. } => vec![EntityKey::Column(column_id.clone())],
            Self::ReorderColumns { from, .. } => state
                .columns()
                .get(*from)
                .map(|column| vec![EntityKey::Column(column.id.clone())])
                .unwrap_or_default(),
            Self::DeleteColumn { column_id } => {
                let mut keys = vec![EntityKey::Column(column_id.clone())];
                keys.extend(
                    state
                        .tasks_in(column_id)
                        .map(|task| EntityKey::Task(task.id.clone())),
                );
                keys
            }
            Self::CreateTask { task_id, .. }
            | Self::UpdateTaskContent { task_id, .. }
            | Self::UpdateTaskMetadata { task_id, .. }
            | Self::ReparentTask { task_id, .. }
            | Self::ReorderOrReparentTask { task_id, .. }
            | Self::DeleteTask { task_id } => vec![EntityKey::Task(task_id.clone())],
        }
    }

    /// Entities this effect only references (foreign keys into columns).
    pub fn referenced_entities(&self) -> Vec<EntityKey> {
        match self {
            Self::CreateTask { column_id, .. }
            | Self::ReparentTask { column_id, .. }
            | Self::ReorderOrReparentTask { column_id, .. } => {
                vec![EntityKey::Column(column_id.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Rewrites every occurrence of a reconciled id.
    pub fn remap(&mut self, remap: &IdRemap) {
        match self {
            Self::CreateColumn { column_id, .. }
            | Self::RenameColumn { column_id, .. }
            | Self::DeleteColumn { column_id } => remap.column(column_id),
            Self::ReorderColumns { .. } => {}
            Self::CreateTask {
                task_id, column_id, ..
            }
            | Self::ReparentTask {
                task_id, column_id, ..
            }
            | Self::ReorderOrReparentTask {
                task_id, column_id, ..
            } => {
                remap.task(task_id);
                remap.column(column_id);
            }
            Self::UpdateTaskContent { task_id, .. }
            | Self::UpdateTaskMetadata { task_id, .. }
            | Self::DeleteTask { task_id } => remap.task(task_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Effect, EntityKey, IdRemap, TaskPosition};
    use crate::model::board::BoardState;
    use crate::model::column::{Column, ColumnId};
    use crate::model::task::{Task, TaskId};

    #[test]
    fn delete_column_writes_cascaded_tasks() {
        let state = BoardState::hydrate(
            vec![Column::new("a", "A"), Column::new("b", "B")],
            vec![Task::new("t1", "a", "x"), Task::new("t5", "b", "y")],
        );
        let effect = Effect::DeleteColumn {
            column_id: ColumnId::new("b"),
        };
        assert_eq!(
            effect.written_entities(&state),
            vec![
                EntityKey::Column(ColumnId::new("b")),
                EntityKey::Task(TaskId::new("t5")),
            ]
        );
    }

    #[test]
    fn remap_rewrites_task_and_foreign_key() {
        let mut effect = Effect::ReparentTask {
            task_id: TaskId::new("tmp-t"),
            column_id: ColumnId::new("tmp-c"),
            position: TaskPosition::End,
        };
        effect.remap(&IdRemap::Column {
            from: ColumnId::new("tmp-c"),
            to: ColumnId::new("srv-c"),
        });
        effect.remap(&IdRemap::Task {
            from: TaskId::new("tmp-t"),
            to: TaskId::new("srv-t"),
        });
        assert_eq!(
            effect,
            Effect::ReparentTask {
                task_id: TaskId::new("srv-t"),
                column_id: ColumnId::new("srv-c"),
                position: TaskPosition::End,
            }
        );
    }
}
