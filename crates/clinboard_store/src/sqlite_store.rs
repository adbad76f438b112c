//! SQLite implementation of the remote board store.
//!
//! # Responsibility
//! - Persist columns and tasks and answer the `RemoteStore` calls.
//! - Assign canonical ids to created entities.
//! - Keep SQL and ordering details inside the store boundary.
//!
//! # Invariants
//! - Listings are deterministic: `sort_order ASC`, then id.
//! - Moves remove the entity, clamp the target slot, then renumber the
//!   affected sequence densely from zero.
//! - Task rows never outlive their column.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use clinboard_core::model::column::{Column, ColumnId};
use clinboard_core::model::task::{Task, TaskId, TaskMetadata};
use clinboard_core::sync::remote::{RemoteError, RemoteResult, RemoteStore, TaskMove, TaskPatch};
use log::{debug, warn};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from board store operations.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    ColumnNotFound(ColumnId),
    TaskNotFound(TaskId),
    /// Connection schema is not at the version this build writes.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    /// Persisted row cannot be converted to a board entity.
    InvalidData(String),
}

impl StoreError {
    /// HTTP-like status reported to sync callers.
    pub fn status(&self) -> u16 {
        match self {
            Self::ColumnNotFound(_) | Self::TaskNotFound(_) => 404,
            Self::Db(DbError::Sqlite(err)) if is_constraint_violation(err) => 409,
            _ => 500,
        }
    }

    fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::ColumnNotFound(id) => write!(f, "column not found: {id}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "board store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "board store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid board data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<StoreError> for RemoteError {
    fn from(value: StoreError) -> Self {
        if value.is_transient() {
            return Self::Unreachable(value.to_string());
        }
        Self::Rejected {
            status: value.status(),
            message: value.to_string(),
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::ConstraintViolation
    )
}

/// Board store over a migrated connection.
pub struct SqliteBoardStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBoardStore<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_board_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Loads every column in board order.
    pub fn columns(&self) -> StoreResult<Vec<Column>> {
        let mut stmt = self.conn.prepare(
            "SELECT column_id, title
             FROM board_columns
             ORDER BY sort_order ASC, column_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            columns.push(Column {
                id: ColumnId::new(row.get::<_, String>(0)?),
                title: row.get(1)?,
            });
        }
        Ok(columns)
    }

    /// Loads every task, grouped by column order, then task order.
    pub fn tasks(&self) -> StoreResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.task_id, t.column_id, t.content, t.metadata_json
             FROM board_tasks t
             JOIN board_columns c ON c.column_id = t.column_id
             ORDER BY c.sort_order ASC, c.column_id ASC, t.sort_order ASC, t.task_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(map_task_row(row)?);
        }
        Ok(tasks)
    }

    pub fn task(&self, id: &TaskId) -> StoreResult<Option<Task>> {
        load_task(self.conn, id)
    }

    pub fn insert_column(&self, title: &str) -> StoreResult<Column> {
        let column = Column::new(ColumnId::new(Uuid::new_v4().to_string()), title);
        let sort_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM board_columns;",
            [],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO board_columns (column_id, title, sort_order) VALUES (?1, ?2, ?3);",
            params![column.id.as_str(), column.title, sort_order],
        )?;
        debug!(
            "event=store_write module=store status=ok op=create_column column_id={}",
            column.id
        );
        Ok(column)
    }

    pub fn rename_column(&self, id: &ColumnId, title: &str) -> StoreResult<Column> {
        let changed = self.conn.execute(
            "UPDATE board_columns SET title = ?2 WHERE column_id = ?1;",
            params![id.as_str(), title],
        )?;
        if changed == 0 {
            return Err(StoreError::ColumnNotFound(id.clone()));
        }
        Ok(Column::new(id.clone(), title))
    }

    /// Deletes the column; its tasks go with it through the foreign key.
    pub fn remove_column(&self, id: &ColumnId) -> StoreResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM board_columns WHERE column_id = ?1;",
            [id.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::ColumnNotFound(id.clone()));
        }
        Ok(())
    }

    pub fn reorder_column(&self, id: &ColumnId, position: usize) -> StoreResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut ids = list_column_ids(&tx)?;
        let Some(current) = ids.iter().position(|candidate| candidate == id) else {
            return Err(StoreError::ColumnNotFound(id.clone()));
        };
        let moved = ids.remove(current);
        let target = position.min(ids.len());
        ids.insert(target, moved);

        for (index, column_id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE board_columns SET sort_order = ?2 WHERE column_id = ?1;",
                params![column_id.as_str(), index as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Inserts `task` under a fresh canonical id.
    ///
    /// `position` counts within the column and clamps to its end; `None`
    /// appends. The column is renumbered densely in the same transaction.
    pub fn insert_task(&self, task: &Task, position: Option<usize>) -> StoreResult<Task> {
        ensure_column_exists(self.conn, &task.column_id)?;
        let stored = Task {
            id: TaskId::new(Uuid::new_v4().to_string()),
            column_id: task.column_id.clone(),
            content: task.content.clone(),
            metadata: task.metadata.clone(),
        };

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut siblings = list_task_ids(&tx, &stored.column_id)?;
        let index = position.unwrap_or(siblings.len()).min(siblings.len());
        tx.execute(
            "INSERT INTO board_tasks (task_id, column_id, content, metadata_json, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                stored.id.as_str(),
                stored.column_id.as_str(),
                stored.content,
                encode_metadata(&stored.metadata)?,
                index as i64,
            ],
        )?;
        siblings.insert(index, stored.id.clone());
        renumber_tasks(&tx, &siblings)?;
        tx.commit()?;

        debug!(
            "event=store_write module=store status=ok op=create_task task_id={} column_id={} index={}",
            stored.id, stored.column_id, index
        );
        Ok(stored)
    }

    /// Applies the present fields of `patch`; metadata is replaced whole.
    pub fn patch_task(&self, id: &TaskId, patch: &TaskPatch) -> StoreResult<Task> {
        let mut task =
            load_task(self.conn, id)?.ok_or_else(|| StoreError::TaskNotFound(id.clone()))?;
        if let Some(content) = &patch.content {
            task.content = content.clone();
        }
        if let Some(metadata) = &patch.metadata {
            task.metadata = metadata.clone();
        }
        self.conn.execute(
            "UPDATE board_tasks SET content = ?2, metadata_json = ?3 WHERE task_id = ?1;",
            params![
                id.as_str(),
                task.content,
                encode_metadata(&task.metadata)?
            ],
        )?;
        Ok(task)
    }

    pub fn remove_task(&self, id: &TaskId) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM board_tasks WHERE task_id = ?1;", [id.as_str()])?;
        if changed == 0 {
            return Err(StoreError::TaskNotFound(id.clone()));
        }
        Ok(())
    }

    /// Moves a task to `target.column_id` at `target.position` within that
    /// column's sequence without the task; `None` appends.
    pub fn relocate_task(&self, id: &TaskId, target: &TaskMove) -> StoreResult<()> {
        if load_task(self.conn, id)?.is_none() {
            return Err(StoreError::TaskNotFound(id.clone()));
        }
        ensure_column_exists(self.conn, &target.column_id)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut siblings = list_task_ids(&tx, &target.column_id)?;
        siblings.retain(|candidate| candidate != id);
        let index = target.position.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(index, id.clone());

        tx.execute(
            "UPDATE board_tasks SET column_id = ?2 WHERE task_id = ?1;",
            params![id.as_str(), target.column_id.as_str()],
        )?;
        renumber_tasks(&tx, &siblings)?;
        tx.commit()?;
        Ok(())
    }
}

impl RemoteStore for SqliteBoardStore<'_> {
    fn list_columns(&self) -> RemoteResult<Vec<Column>> {
        remote("list_columns", self.columns())
    }

    fn list_tasks(&self) -> RemoteResult<Vec<Task>> {
        remote("list_tasks", self.tasks())
    }

    /// The client's temporary id is discarded; the answer carries the
    /// canonical one.
    fn create_column(&self, column: &Column) -> RemoteResult<Column> {
        remote("create_column", self.insert_column(&column.title))
    }

    fn update_column(&self, id: &ColumnId, title: &str) -> RemoteResult<Column> {
        remote("update_column", self.rename_column(id, title))
    }

    fn delete_column(&self, id: &ColumnId) -> RemoteResult<()> {
        remote("delete_column", self.remove_column(id))
    }

    fn move_column(&self, id: &ColumnId, position: usize) -> RemoteResult<()> {
        remote("move_column", self.reorder_column(id, position))
    }

    fn create_task(&self, task: &Task, position: Option<usize>) -> RemoteResult<Task> {
        remote("create_task", self.insert_task(task, position))
    }

    fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> RemoteResult<Task> {
        remote("update_task", self.patch_task(id, patch))
    }

    fn delete_task(&self, id: &TaskId) -> RemoteResult<()> {
        remote("delete_task", self.remove_task(id))
    }

    fn move_task(&self, id: &TaskId, target: &TaskMove) -> RemoteResult<()> {
        remote("move_task", self.relocate_task(id, target))
    }
}

fn remote<T>(op: &str, result: StoreResult<T>) -> RemoteResult<T> {
    result.map_err(|err| {
        warn!(
            "event=store_call module=store status=error op={} status_code={} error={}",
            op,
            err.status(),
            err
        );
        RemoteError::from(err)
    })
}

fn ensure_board_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["board_columns", "board_tasks"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(StoreError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

/// Rewrites `sort_order` densely in the given sequence.
fn renumber_tasks(conn: &Connection, ordered: &[TaskId]) -> StoreResult<()> {
    for (order, task_id) in ordered.iter().enumerate() {
        conn.execute(
            "UPDATE board_tasks SET sort_order = ?2 WHERE task_id = ?1;",
            params![task_id.as_str(), order as i64],
        )?;
    }
    Ok(())
}

fn ensure_column_exists(conn: &Connection, id: &ColumnId) -> StoreResult<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM board_columns WHERE column_id = ?1;",
            [id.as_str()],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or_else(|| StoreError::ColumnNotFound(id.clone()))
}

fn list_column_ids(conn: &Connection) -> StoreResult<Vec<ColumnId>> {
    let mut stmt =
        conn.prepare("SELECT column_id FROM board_columns ORDER BY sort_order ASC, column_id ASC;")?;
    let mut rows = stmt.query([])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(ColumnId::new(row.get::<_, String>(0)?));
    }
    Ok(ids)
}

fn list_task_ids(conn: &Connection, column_id: &ColumnId) -> StoreResult<Vec<TaskId>> {
    let mut stmt = conn.prepare(
        "SELECT task_id FROM board_tasks
         WHERE column_id = ?1
         ORDER BY sort_order ASC, task_id ASC;",
    )?;
    let mut rows = stmt.query([column_id.as_str()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(TaskId::new(row.get::<_, String>(0)?));
    }
    Ok(ids)
}

fn load_task(conn: &Connection, id: &TaskId) -> StoreResult<Option<Task>> {
    let mut stmt = conn.prepare(
        "SELECT task_id, column_id, content, metadata_json
         FROM board_tasks
         WHERE task_id = ?1;",
    )?;
    let mut rows = stmt.query([id.as_str()])?;
    match rows.next()? {
        Some(row) => map_task_row(row).map(Some),
        None => Ok(None),
    }
}

fn map_task_row(row: &Row<'_>) -> StoreResult<Task> {
    let task_id: String = row.get(0)?;
    let raw_metadata: String = row.get(3)?;
    let metadata: TaskMetadata = serde_json::from_str(&raw_metadata).map_err(|err| {
        StoreError::InvalidData(format!("task `{task_id}` has malformed metadata: {err}"))
    })?;
    Ok(Task {
        id: TaskId::new(task_id),
        column_id: ColumnId::new(row.get::<_, String>(1)?),
        content: row.get(2)?,
        metadata,
    })
}

fn encode_metadata(metadata: &TaskMetadata) -> StoreResult<String> {
    serde_json::to_string(metadata)
        .map_err(|err| StoreError::InvalidData(format!("metadata is not serializable: {err}")))
}
