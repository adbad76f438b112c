//! Board aggregate: ordered columns plus ordered tasks.
//!
//! # Responsibility
//! - Own the complete (columns, tasks) state for one board context.
//! - Provide read-only queries for rendering and drop resolution.
//!
//! # Invariants
//! - Column and task ids are unique within the aggregate.
//! - Every task references an existing column (no orphans).
//! - Per-column task order is the relative order of that column's tasks in
//!   the flat task sequence.
//! - Mutation happens only through `board::reducer`; fields stay private.

use crate::model::column::{Column, ColumnId};
use crate::model::task::{Task, TaskId};
use log::warn;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Structural invariant violations detected by `BoardState::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardInvariantError {
    DuplicateColumnId(ColumnId),
    DuplicateTaskId(TaskId),
    OrphanTask { task_id: TaskId, column_id: ColumnId },
}

impl Display for BoardInvariantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateColumnId(id) => write!(f, "duplicate column id: {id}"),
            Self::DuplicateTaskId(id) => write!(f, "duplicate task id: {id}"),
            Self::OrphanTask { task_id, column_id } => {
                write!(f, "task {task_id} references missing column {column_id}")
            }
        }
    }
}

impl Error for BoardInvariantError {}

/// Complete board state for one context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoardState {
    columns: Vec<Column>,
    tasks: Vec<Task>,
}

impl BoardState {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from remote listings.
    ///
    /// Duplicate ids keep their first occurrence and tasks pointing at an
    /// unknown column are dropped, so the result always validates.
    pub fn hydrate(columns: Vec<Column>, tasks: Vec<Task>) -> Self {
        let mut seen_columns = HashSet::new();
        let mut kept_columns = Vec::with_capacity(columns.len());
        for column in columns {
            if !seen_columns.insert(column.id.clone()) {
                warn!(
                    "event=board_hydrate module=model status=skip reason=duplicate_column column_id={}",
                    column.id
                );
                continue;
            }
            kept_columns.push(column);
        }

        let mut seen_tasks = HashSet::new();
        let mut kept_tasks = Vec::with_capacity(tasks.len());
        for task in tasks {
            if !seen_columns.contains(&task.column_id) {
                warn!(
                    "event=board_hydrate module=model status=skip reason=orphan_task task_id={} column_id={}",
                    task.id, task.column_id
                );
                continue;
            }
            if !seen_tasks.insert(task.id.clone()) {
                warn!(
                    "event=board_hydrate module=model status=skip reason=duplicate_task task_id={}",
                    task.id
                );
                continue;
            }
            kept_tasks.push(task);
        }

        Self {
            columns: kept_columns,
            tasks: kept_tasks,
        }
    }

    /// Columns in display order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// All tasks in the flat sequence that encodes per-column order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|column| &column.id == id)
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| &task.id == id)
    }

    /// Display index of one column.
    pub fn column_index(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|column| &column.id == id)
    }

    /// Tasks of one column in display order.
    pub fn tasks_in<'a>(
        &'a self,
        column_id: &'a ColumnId,
    ) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |task| &task.column_id == column_id)
    }

    /// Task ids of one column in display order.
    pub fn task_ids_in(&self, column_id: &ColumnId) -> Vec<TaskId> {
        self.tasks_in(column_id).map(|task| task.id.clone()).collect()
    }

    /// Returns `(column_id, index within column)` for one task.
    pub fn task_position(&self, id: &TaskId) -> Option<(ColumnId, usize)> {
        let task = self.task(id)?;
        let index = self
            .tasks_in(&task.column_id)
            .position(|candidate| &candidate.id == id)?;
        Some((task.column_id.clone(), index))
    }

    /// Tasks whose `relatedContextId` metadata equals `context_id`.
    ///
    /// Cross-context views pass the context explicitly instead of sharing
    /// one global task list.
    pub fn tasks_for_context<'a>(
        &'a self,
        context_id: &'a str,
    ) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .iter()
            .filter(move |task| task.related_context_id() == Some(context_id))
    }

    /// Checks id uniqueness and foreign-key integrity.
    pub fn validate(&self) -> Result<(), BoardInvariantError> {
        let mut column_ids = HashSet::new();
        for column in &self.columns {
            if !column_ids.insert(&column.id) {
                return Err(BoardInvariantError::DuplicateColumnId(column.id.clone()));
            }
        }

        let mut task_ids = HashSet::new();
        for task in &self.tasks {
            if !task_ids.insert(&task.id) {
                return Err(BoardInvariantError::DuplicateTaskId(task.id.clone()));
            }
            if !column_ids.contains(&task.column_id) {
                return Err(BoardInvariantError::OrphanTask {
                    task_id: task.id.clone(),
                    column_id: task.column_id.clone(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn columns_mut(&mut self) -> &mut Vec<Column> {
        &mut self.columns
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut Vec<Task> {
        &mut self.tasks
    }
}
