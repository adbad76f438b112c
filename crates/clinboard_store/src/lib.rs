//! SQLite-backed board authority.
//!
//! # Responsibility
//! - Persist boards durably behind the `RemoteStore` contract of
//!   `clinboard_core`.
//! - Own schema migrations and connection bootstrap.
//!
//! The core never depends on this crate; it only sees `RemoteStore`.

pub mod db;
pub mod sqlite_store;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use sqlite_store::{SqliteBoardStore, StoreError, StoreResult};
