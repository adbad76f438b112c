//! Core of the clinical task board.
//! Owns the board invariants: ordered columns, ordered tasks, and the
//! optimistic protocol that keeps them consistent with a remote store.

pub mod board;
pub mod collab;
pub mod config;
pub mod drag;
pub mod logging;
pub mod model;
pub mod sync;

pub use board::effect::{Effect, EntityKey, IdRemap, TaskPosition};
pub use board::reducer::{reduce, try_reduce, ReduceError};
pub use config::{ConfigError, CoreConfig};
pub use drag::capability::{CapabilityTag, Draggable};
pub use drag::session::{DragSession, DragState, Point};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::board::{BoardInvariantError, BoardState};
pub use model::column::{Column, ColumnId};
pub use model::task::{Task, TaskId, TaskMetadata};
pub use sync::coordinator::{MutationId, SyncCoordinator, SyncError, SyncFailure};
pub use sync::remote::{RemoteError, RemoteStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
