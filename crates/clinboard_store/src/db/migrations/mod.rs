//! Board schema migrations.
//!
//! # Responsibility
//! - Bring a connection from its `PRAGMA user_version` up to
//!   [`latest_version`].
//! - Refuse databases written by a newer build.
//!
//! # Invariants
//! - `version` values are strictly increasing.
//! - All pending steps run inside one transaction; a failed step leaves
//!   `user_version` untouched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_board.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_task_context_index.sql"),
    },
];

/// Latest schema version this build understands.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies every migration newer than the database's `user_version`.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current = current_user_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from={current} to={latest}");
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn newer_database_is_refused() {
        let mut conn = Connection::open_in_memory().expect("in-memory db should open");
        conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version() + 1))
            .expect("user_version should be writable");
        let err = apply_migrations(&mut conn).expect_err("future schema must be refused");
        assert!(matches!(err, DbError::UnsupportedSchemaVersion { .. }));
    }

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().expect("in-memory db should open");
        apply_migrations(&mut conn).expect("first run should migrate");
        apply_migrations(&mut conn).expect("second run should be a no-op");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'board_%';",
                [],
                |row| row.get(0),
            )
            .expect("table count query should succeed");
        assert_eq!(tables, 2);
    }
}
