//! Pure board reducer.
//!
//! # Responsibility
//! - Map `(state, effect)` to the next board state.
//! - Own all ordering semantics for columns and tasks.
//!
//! # Invariants
//! - Never partially applies an effect: failure returns the input unchanged.
//! - Task moves remove the task first and resolve the target index against
//!   the post-removal column sequence; out-of-range indices clamp to the end.
//! - Deleting a column deletes its tasks in the same step (no orphans).
//! - Total task count changes only on create/delete effects.

use crate::board::effect::{Effect, EntityKey, IdRemap};
use crate::model::board::BoardState;
use crate::model::column::{Column, ColumnId};
use crate::model::task::{Task, TaskId};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reasons an effect reduced to a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReduceError {
    /// Effect references an id that does not exist on the board.
    UnknownEntity(EntityKey),
    /// Create effect reuses an id that already exists.
    DuplicateEntity(EntityKey),
    /// Column reorder index outside the column sequence.
    ColumnIndexOutOfRange { index: usize, len: usize },
}

impl ReduceError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownEntity(_) => "unknown_entity",
            Self::DuplicateEntity(_) => "duplicate_entity",
            Self::ColumnIndexOutOfRange { .. } => "column_index_out_of_range",
        }
    }
}

impl Display for ReduceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(key) => write!(f, "unknown entity: {key}"),
            Self::DuplicateEntity(key) => write!(f, "entity already exists: {key}"),
            Self::ColumnIndexOutOfRange { index, len } => {
                write!(f, "column index {index} out of range for {len} columns")
            }
        }
    }
}

impl Error for ReduceError {}

/// Applies one effect, treating every rejected effect as a logged no-op.
pub fn reduce(state: &BoardState, effect: &Effect) -> BoardState {
    match try_reduce(state, effect) {
        Ok(next) => next,
        Err(err) => {
            warn!(
                "event=board_reduce module=board status=noop effect={} error_code={} error={}",
                effect.name(),
                err.code(),
                err
            );
            state.clone()
        }
    }
}

/// Applies one effect, reporting why it could not be applied.
pub fn try_reduce(state: &BoardState, effect: &Effect) -> Result<BoardState, ReduceError> {
    let mut next = state.clone();
    match effect {
        Effect::CreateColumn { column_id, title } => {
            if next.column(column_id).is_some() {
                return Err(ReduceError::DuplicateEntity(EntityKey::Column(
                    column_id.clone(),
                )));
            }
            next.columns_mut()
                .push(Column::new(column_id.clone(), title.clone()));
        }
        Effect::RenameColumn { column_id, title } => {
            let column = next
                .columns_mut()
                .iter_mut()
                .find(|column| &column.id == column_id)
                .ok_or_else(|| unknown_column(column_id))?;
            column.title = title.clone();
        }
        Effect::ReorderColumns { from, to } => {
            let len = next.columns().len();
            for index in [*from, *to] {
                if index >= len {
                    return Err(ReduceError::ColumnIndexOutOfRange { index, len });
                }
            }
            if from != to {
                let columns = next.columns_mut();
                let moved = columns.remove(*from);
                columns.insert(*to, moved);
            }
        }
        Effect::DeleteColumn { column_id } => {
            if next.column(column_id).is_none() {
                return Err(unknown_column(column_id));
            }
            next.columns_mut().retain(|column| &column.id != column_id);
            next.tasks_mut().retain(|task| &task.column_id != column_id);
        }
        Effect::CreateTask {
            task_id,
            column_id,
            content,
            metadata,
            position,
        } => {
            if next.column(column_id).is_none() {
                return Err(unknown_column(column_id));
            }
            if next.task(task_id).is_some() {
                return Err(ReduceError::DuplicateEntity(EntityKey::Task(
                    task_id.clone(),
                )));
            }
            let mut task = Task::new(task_id.clone(), column_id.clone(), content.clone());
            task.metadata = metadata.clone();
            insert_task(next.tasks_mut(), task, position.index());
        }
        Effect::UpdateTaskContent { task_id, content } => {
            find_task_mut(&mut next, task_id)?.content = content.clone();
        }
        Effect::UpdateTaskMetadata { task_id, metadata } => {
            find_task_mut(&mut next, task_id)?.metadata = metadata.clone();
        }
        Effect::ReparentTask {
            task_id,
            column_id,
            position,
        } => move_task(&mut next, task_id, column_id, position.index())?,
        Effect::ReorderOrReparentTask {
            task_id,
            column_id,
            index,
        } => move_task(&mut next, task_id, column_id, Some(*index))?,
        Effect::DeleteTask { task_id } => {
            let tasks = next.tasks_mut();
            let index = tasks
                .iter()
                .position(|task| &task.id == task_id)
                .ok_or_else(|| unknown_task(task_id))?;
            tasks.remove(index);
        }
    }

    debug!(
        "event=board_reduce module=board status=ok effect={} columns={} tasks={}",
        effect.name(),
        next.columns().len(),
        next.tasks().len()
    );
    Ok(next)
}

/// Rewrites a reconciled id everywhere it occurs, including task foreign keys.
///
/// Order and every other field are left untouched.
pub fn reconcile_ids(state: &BoardState, remap: &IdRemap) -> BoardState {
    let mut next = state.clone();
    for column in next.columns_mut() {
        remap.column(&mut column.id);
    }
    for task in next.tasks_mut() {
        remap.task(&mut task.id);
        remap.column(&mut task.column_id);
    }
    next
}

/// Same-column and cross-column moves share one path: remove, retarget,
/// then insert against the post-removal sequence of the target column.
fn move_task(
    state: &mut BoardState,
    task_id: &TaskId,
    column_id: &ColumnId,
    index: Option<usize>,
) -> Result<(), ReduceError> {
    if state.column(column_id).is_none() {
        return Err(unknown_column(column_id));
    }
    let tasks = state.tasks_mut();
    let current = tasks
        .iter()
        .position(|task| &task.id == task_id)
        .ok_or_else(|| unknown_task(task_id))?;

    let mut task = tasks.remove(current);
    task.column_id = column_id.clone();
    insert_task(tasks, task, index);
    Ok(())
}

fn insert_task(tasks: &mut Vec<Task>, task: Task, index: Option<usize>) {
    let slots: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, candidate)| candidate.column_id == task.column_id)
        .map(|(slot, _)| slot)
        .collect();

    let at = match index.and_then(|index| slots.get(index)) {
        Some(&slot) => slot,
        None => slots.last().map_or(tasks.len(), |last| last + 1),
    };
    tasks.insert(at, task);
}

fn find_task_mut<'a>(
    state: &'a mut BoardState,
    task_id: &TaskId,
) -> Result<&'a mut Task, ReduceError> {
    state
        .tasks_mut()
        .iter_mut()
        .find(|task| &task.id == task_id)
        .ok_or_else(|| unknown_task(task_id))
}

fn unknown_column(id: &ColumnId) -> ReduceError {
    ReduceError::UnknownEntity(EntityKey::Column(id.clone()))
}

fn unknown_task(id: &TaskId) -> ReduceError {
    ReduceError::UnknownEntity(EntityKey::Task(id.clone()))
}
