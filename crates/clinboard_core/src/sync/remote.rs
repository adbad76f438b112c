//! Remote persistence collaborator contract.
//!
//! # Responsibility
//! - Define the calls the board issues against the remote authority.
//! - Map each board effect to exactly one remote operation.
//!
//! # Invariants
//! - Every call is at-most-once from the client side; no retries here.
//! - Create calls may answer with a canonical id that differs from the
//!   client's temporary id.

use crate::board::effect::{Effect, EntityKey, IdRemap, TaskPosition};
use crate::board::reducer::ReduceError;
use crate::model::board::BoardState;
use crate::model::column::{Column, ColumnId};
use crate::model::task::{Task, TaskId, TaskMetadata};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure reported by the remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Remote answered with a non-success status.
    Rejected { status: u16, message: String },
    /// Transport-level failure; the remote was never reached or never answered.
    Unreachable(String),
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected { status, message } => {
                write!(f, "remote rejected change with status {status}: {message}")
            }
            Self::Unreachable(message) => write!(f, "remote unreachable: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Partial task update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TaskMetadata>,
}

/// Move request body: target column and slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMove {
    pub column_id: ColumnId,
    /// `None` appends to the end of the column.
    pub position: Option<usize>,
}

/// Remote persistence collaborator.
///
/// Column calls complement the task calls so every board effect has a
/// durable counterpart.
pub trait RemoteStore {
    fn list_columns(&self) -> RemoteResult<Vec<Column>>;
    fn list_tasks(&self) -> RemoteResult<Vec<Task>>;
    fn create_column(&self, column: &Column) -> RemoteResult<Column>;
    fn update_column(&self, id: &ColumnId, title: &str) -> RemoteResult<Column>;
    /// Deletes the column; the remote cascades to its tasks.
    fn delete_column(&self, id: &ColumnId) -> RemoteResult<()>;
    fn move_column(&self, id: &ColumnId, position: usize) -> RemoteResult<()>;
    /// Creates `task` at `position` of its column; `None` appends.
    fn create_task(&self, task: &Task, position: Option<usize>) -> RemoteResult<Task>;
    fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> RemoteResult<Task>;
    fn delete_task(&self, id: &TaskId) -> RemoteResult<()>;
    fn move_task(&self, id: &TaskId, target: &TaskMove) -> RemoteResult<()>;
}

/// One remote call derived from an effect.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    CreateColumn(Column),
    UpdateColumn { id: ColumnId, title: String },
    DeleteColumn { id: ColumnId },
    MoveColumn { id: ColumnId, position: usize },
    /// `position` is the slot the optimistic apply resolved, `None` to append.
    CreateTask { task: Task, position: Option<usize> },
    UpdateTask { id: TaskId, patch: TaskPatch },
    DeleteTask { id: TaskId },
    MoveTask { id: TaskId, target: TaskMove },
}

/// Successful remote answer.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteAck {
    Done,
    Column(Column),
    Task(Task),
}

impl RemoteOp {
    /// Derives the remote call for `effect`, which turned `before` into `after`.
    pub fn from_effect(
        effect: &Effect,
        before: &BoardState,
        after: &BoardState,
    ) -> Result<Self, ReduceError> {
        Ok(match effect {
            Effect::CreateColumn { column_id, .. } => Self::CreateColumn(
                after
                    .column(column_id)
                    .ok_or_else(|| ReduceError::UnknownEntity(EntityKey::Column(column_id.clone())))?
                    .clone(),
            ),
            Effect::RenameColumn { column_id, title } => Self::UpdateColumn {
                id: column_id.clone(),
                title: title.clone(),
            },
            Effect::ReorderColumns { from, to } => Self::MoveColumn {
                id: before
                    .columns()
                    .get(*from)
                    .ok_or(ReduceError::ColumnIndexOutOfRange {
                        index: *from,
                        len: before.columns().len(),
                    })?
                    .id
                    .clone(),
                position: *to,
            },
            Effect::DeleteColumn { column_id } => Self::DeleteColumn {
                id: column_id.clone(),
            },
            Effect::CreateTask {
                task_id, position, ..
            } => {
                let unknown = || ReduceError::UnknownEntity(EntityKey::Task(task_id.clone()));
                let task = after.task(task_id).ok_or_else(unknown)?.clone();
                let position = match position {
                    TaskPosition::End => None,
                    TaskPosition::Index(_) => {
                        Some(after.task_position(task_id).ok_or_else(unknown)?.1)
                    }
                };
                Self::CreateTask { task, position }
            }
            Effect::UpdateTaskContent { task_id, content } => Self::UpdateTask {
                id: task_id.clone(),
                patch: TaskPatch {
                    content: Some(content.clone()),
                    metadata: None,
                },
            },
            Effect::UpdateTaskMetadata { task_id, metadata } => Self::UpdateTask {
                id: task_id.clone(),
                patch: TaskPatch {
                    content: None,
                    metadata: Some(metadata.clone()),
                },
            },
            Effect::ReparentTask {
                task_id,
                column_id,
                position,
            } => Self::MoveTask {
                id: task_id.clone(),
                target: TaskMove {
                    column_id: column_id.clone(),
                    position: match position {
                        TaskPosition::End => None,
                        TaskPosition::Index(index) => Some(*index),
                    },
                },
            },
            Effect::ReorderOrReparentTask {
                task_id,
                column_id,
                index,
            } => Self::MoveTask {
                id: task_id.clone(),
                target: TaskMove {
                    column_id: column_id.clone(),
                    position: Some(*index),
                },
            },
            Effect::DeleteTask { task_id } => Self::DeleteTask {
                id: task_id.clone(),
            },
        })
    }

    /// Short stable name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateColumn(_) => "create_column",
            Self::UpdateColumn { .. } => "update_column",
            Self::DeleteColumn { .. } => "delete_column",
            Self::MoveColumn { .. } => "move_column",
            Self::CreateTask { .. } => "create_task",
            Self::UpdateTask { .. } => "update_task",
            Self::DeleteTask { .. } => "delete_task",
            Self::MoveTask { .. } => "move_task",
        }
    }

    /// Entity whose canonical id the acknowledgement may carry.
    pub fn created_entity(&self) -> Option<EntityKey> {
        match self {
            Self::CreateColumn(column) => Some(EntityKey::Column(column.id.clone())),
            Self::CreateTask { task, .. } => Some(EntityKey::Task(task.id.clone())),
            _ => None,
        }
    }

    /// Issues this call against the remote store.
    pub fn execute<S: RemoteStore + ?Sized>(&self, store: &S) -> RemoteResult<RemoteAck> {
        match self {
            Self::CreateColumn(column) => store.create_column(column).map(RemoteAck::Column),
            Self::UpdateColumn { id, title } => store.update_column(id, title).map(RemoteAck::Column),
            Self::DeleteColumn { id } => store.delete_column(id).map(|()| RemoteAck::Done),
            Self::MoveColumn { id, position } => {
                store.move_column(id, *position).map(|()| RemoteAck::Done)
            }
            Self::CreateTask { task, position } => {
                store.create_task(task, *position).map(RemoteAck::Task)
            }
            Self::UpdateTask { id, patch } => store.update_task(id, patch).map(RemoteAck::Task),
            Self::DeleteTask { id } => store.delete_task(id).map(|()| RemoteAck::Done),
            Self::MoveTask { id, target } => store.move_task(id, target).map(|()| RemoteAck::Done),
        }
    }

    /// Rewrites every occurrence of a reconciled id.
    pub fn remap(&mut self, remap: &IdRemap) {
        match self {
            Self::CreateColumn(column) => remap.column(&mut column.id),
            Self::UpdateColumn { id, .. }
            | Self::DeleteColumn { id }
            | Self::MoveColumn { id, .. } => remap.column(id),
            Self::CreateTask { task, .. } => {
                remap.task(&mut task.id);
                remap.column(&mut task.column_id);
            }
            Self::UpdateTask { id, .. } | Self::DeleteTask { id } => remap.task(id),
            Self::MoveTask { id, target } => {
                remap.task(id);
                remap.column(&mut target.column_id);
            }
        }
    }
}
