//! Optimistic sync coordinator.
//!
//! # Responsibility
//! - Apply every board effect locally first, then confirm it remotely.
//! - Reconcile temporary ids with server-assigned ids on confirmation.
//! - Roll back to the pre-effect snapshot when the remote call fails.
//!
//! # Invariants
//! - The board state is mutated only here, and only through the reducer.
//! - Local transitions apply in submission order; confirmations may arrive
//!   in any order and are matched by mutation id and entity id.
//! - At most one in-flight mutation writes a given entity id.
//! - A remote op referencing an unconfirmed created entity is not
//!   dispatched until that entity is reconciled.
//! - After a failure the state equals the failed mutation's snapshot with
//!   the later surviving effects replayed on top; with nothing else in
//!   flight it equals the snapshot exactly.

use crate::board::effect::{Effect, EntityKey, IdRemap};
use crate::board::reducer::{reconcile_ids, try_reduce, ReduceError};
use crate::config::SyncConfig;
use crate::drag::capability::Draggable;
use crate::drag::session::DragSession;
use crate::logging::sanitize_message;
use crate::model::board::BoardState;
use crate::sync::remote::{RemoteAck, RemoteError, RemoteOp, RemoteStore};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Message shown to the user when an optimistic change is reverted.
pub const SAVE_FAILED_MESSAGE: &str = "could not save change, please retry";

const MAX_LOGGED_REMOTE_MESSAGE_CHARS: usize = 200;

/// Identifier of one submitted mutation.
pub type MutationId = u64;

/// Errors surfaced by the coordinator. None of them is fatal; the board is
/// always left in a consistent state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Effect references a missing id; nothing was applied.
    UnknownEntity(EntityKey),
    /// Effect is structurally invalid for the current state.
    InvalidEffect(ReduceError),
    /// Another in-flight mutation is writing the same entity.
    EntityBusy { key: EntityKey, owner: MutationId },
    /// No dispatched mutation with this id.
    UnknownMutation(MutationId),
    /// Operation needs a quiescent board.
    MutationsInFlight(usize),
    /// Remote answered with a failure status; the change was reverted.
    RemoteRejected {
        mutation: Option<MutationId>,
        status: u16,
        message: String,
    },
    /// Remote could not be reached; the change was reverted.
    RemoteUnreachable {
        mutation: Option<MutationId>,
        message: String,
    },
}

impl SyncError {
    fn from_remote(mutation: Option<MutationId>, err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected { status, message } => Self::RemoteRejected {
                mutation,
                status,
                message,
            },
            RemoteError::Unreachable(message) => Self::RemoteUnreachable { mutation, message },
        }
    }

    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownEntity(_) => "unknown_entity",
            Self::InvalidEffect(_) => "invalid_effect",
            Self::EntityBusy { .. } => "entity_busy",
            Self::UnknownMutation(_) => "unknown_mutation",
            Self::MutationsInFlight(_) => "mutations_in_flight",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::RemoteUnreachable { .. } => "remote_unreachable",
        }
    }

    /// Whether this error reverted an optimistic change the user saw.
    pub fn reverted_change(&self) -> bool {
        matches!(
            self,
            Self::RemoteRejected { mutation: Some(_), .. }
                | Self::RemoteUnreachable { mutation: Some(_), .. }
        )
    }

    /// User-facing notification text.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RemoteRejected { .. } | Self::RemoteUnreachable { .. } => SAVE_FAILED_MESSAGE,
            Self::EntityBusy { .. } => "change is still saving, please wait",
            _ => "change could not be applied",
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownEntity(key) => write!(f, "unknown entity: {key}"),
            Self::InvalidEffect(err) => write!(f, "invalid effect: {err}"),
            Self::EntityBusy { key, owner } => {
                write!(f, "{key} is being written by mutation {owner}")
            }
            Self::UnknownMutation(id) => write!(f, "no dispatched mutation with id {id}"),
            Self::MutationsInFlight(count) => write!(f, "{count} mutations still in flight"),
            Self::RemoteRejected {
                status, message, ..
            } => write!(f, "remote rejected change with status {status}: {message}"),
            Self::RemoteUnreachable { message, .. } => write!(f, "remote unreachable: {message}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEffect(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReduceError> for SyncError {
    fn from(value: ReduceError) -> Self {
        match value {
            ReduceError::UnknownEntity(key) => Self::UnknownEntity(key),
            other => Self::InvalidEffect(other),
        }
    }
}

/// Remote call handed out for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub id: MutationId,
    pub op: RemoteOp,
}

/// One reverted mutation, kept until the presentation layer drains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub mutation: MutationId,
    pub error: SyncError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Queued,
    Dispatched,
    Confirmed,
}

#[derive(Debug, Clone)]
struct InFlight {
    id: MutationId,
    effect: Effect,
    before: BoardState,
    op: RemoteOp,
    stage: Stage,
    locks: Vec<EntityKey>,
}

impl InFlight {
    fn is_open(&self) -> bool {
        self.stage != Stage::Confirmed
    }

    /// Index-based column moves are re-anchored on the moved column id so a
    /// replay onto a different snapshot moves the same column.
    fn replay_effect(&self, state: &BoardState) -> Effect {
        match (&self.effect, self.locks.first()) {
            (Effect::ReorderColumns { to, .. }, Some(EntityKey::Column(id))) => {
                match state.column_index(id) {
                    Some(from) => Effect::ReorderColumns {
                        from,
                        to: (*to).min(state.columns().len().saturating_sub(1)),
                    },
                    None => self.effect.clone(),
                }
            }
            _ => self.effect.clone(),
        }
    }
}

/// Owns one board aggregate and keeps it consistent with the remote store.
#[derive(Debug, Clone)]
pub struct SyncCoordinator {
    state: BoardState,
    journal: Vec<InFlight>,
    failures: Vec<SyncFailure>,
    next_id: MutationId,
    temp_id_prefix: String,
}

impl SyncCoordinator {
    /// Wraps an existing board state.
    pub fn new(state: BoardState, config: &SyncConfig) -> Self {
        Self {
            state,
            journal: Vec::new(),
            failures: Vec::new(),
            next_id: 1,
            temp_id_prefix: config.temp_id_prefix.clone(),
        }
    }

    /// Latest committed-or-optimistic state, for rendering.
    pub fn state(&self) -> &BoardState {
        &self.state
    }

    /// Prefix used for client-generated ids of this board.
    pub fn temp_id_prefix(&self) -> &str {
        &self.temp_id_prefix
    }

    /// Number of mutations not yet confirmed or rolled back.
    pub fn in_flight(&self) -> usize {
        self.journal.iter().filter(|entry| entry.is_open()).count()
    }

    /// Whether a mutation is still awaiting its remote outcome.
    pub fn is_pending(&self, id: MutationId) -> bool {
        self.journal
            .iter()
            .any(|entry| entry.id == id && entry.is_open())
    }

    /// Mutation currently holding the write lock for `key`.
    pub fn lock_owner(&self, key: &EntityKey) -> Option<MutationId> {
        self.journal
            .iter()
            .find(|entry| entry.is_open() && entry.locks.contains(key))
            .map(|entry| entry.id)
    }

    /// Replaces the board with the remote listing.
    pub fn hydrate<S: RemoteStore + ?Sized>(&mut self, store: &S) -> Result<(), SyncError> {
        let open = self.in_flight();
        if open > 0 {
            return Err(SyncError::MutationsInFlight(open));
        }
        let columns = store
            .list_columns()
            .map_err(|err| SyncError::from_remote(None, err))?;
        let tasks = store
            .list_tasks()
            .map_err(|err| SyncError::from_remote(None, err))?;

        self.state = BoardState::hydrate(columns, tasks);
        self.journal.clear();
        info!(
            "event=sync_hydrate module=sync status=ok columns={} tasks={}",
            self.state.columns().len(),
            self.state.tasks().len()
        );
        Ok(())
    }

    /// Snapshots, applies `effect` optimistically, and queues its remote call.
    ///
    /// Returns `Ok(None)` when the effect leaves the board unchanged; no
    /// remote call is queued in that case.
    pub fn submit(&mut self, effect: Effect) -> Result<Option<MutationId>, SyncError> {
        let locks = effect.written_entities(&self.state);
        for key in &locks {
            if let Some(owner) = self.lock_owner(key) {
                warn!(
                    "event=sync_submit module=sync status=busy effect={} entity={} owner={}",
                    effect.name(),
                    key,
                    owner
                );
                return Err(SyncError::EntityBusy {
                    key: key.clone(),
                    owner,
                });
            }
        }

        let before = self.state.clone();
        let after = match try_reduce(&before, &effect) {
            Ok(after) => after,
            Err(err) => {
                warn!(
                    "event=sync_submit module=sync status=noop effect={} error_code={} error={}",
                    effect.name(),
                    err.code(),
                    err
                );
                return Err(err.into());
            }
        };
        if after == before {
            debug!(
                "event=sync_submit module=sync status=unchanged effect={}",
                effect.name()
            );
            return Ok(None);
        }

        let op = RemoteOp::from_effect(&effect, &before, &after)?;

        let id = self.next_id;
        self.next_id += 1;
        info!(
            "event=sync_submit module=sync status=ok mutation={} effect={} op={}",
            id,
            effect.name(),
            op.name()
        );
        self.journal.push(InFlight {
            id,
            effect,
            before,
            op,
            stage: Stage::Queued,
            locks,
        });
        self.state = after;
        Ok(Some(id))
    }

    /// Ends a drag gesture and submits its effect, if the drop produced one.
    pub fn drop_on(
        &mut self,
        session: &mut DragSession,
        target: Option<Draggable>,
    ) -> Result<Option<MutationId>, SyncError> {
        match session.end(target, &self.state) {
            Some(effect) => self.submit(effect),
            None => Ok(None),
        }
    }

    /// Hands out the next remote call that can be issued now.
    ///
    /// Calls referencing a column whose creation is still unconfirmed stay
    /// queued until that column is reconciled.
    pub fn next_dispatch(&mut self) -> Option<Dispatch> {
        let unconfirmed_creates: HashSet<EntityKey> = self
            .journal
            .iter()
            .filter(|entry| entry.is_open())
            .filter_map(|entry| entry.effect.created_entity())
            .collect();

        let entry = self.journal.iter_mut().find(|entry| {
            entry.stage == Stage::Queued
                && entry
                    .effect
                    .referenced_entities()
                    .iter()
                    .all(|key| !unconfirmed_creates.contains(key))
        })?;
        entry.stage = Stage::Dispatched;
        debug!(
            "event=sync_dispatch module=sync status=ok mutation={} op={}",
            entry.id,
            entry.op.name()
        );
        Some(Dispatch {
            id: entry.id,
            op: entry.op.clone(),
        })
    }

    /// Delivers the remote outcome of a dispatched mutation.
    ///
    /// A failure reverts the mutation and is returned as the error; it is
    /// also recorded for `drain_failures`.
    pub fn complete(
        &mut self,
        id: MutationId,
        outcome: Result<RemoteAck, RemoteError>,
    ) -> Result<(), SyncError> {
        let index = self
            .journal
            .iter()
            .position(|entry| entry.id == id && entry.stage == Stage::Dispatched)
            .ok_or(SyncError::UnknownMutation(id))?;

        match outcome {
            Ok(ack) => {
                self.confirm(index, ack);
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=sync_complete module=sync status=error mutation={} op={} error={}",
                    id,
                    self.journal[index].op.name(),
                    sanitize_message(&err.to_string(), MAX_LOGGED_REMOTE_MESSAGE_CHARS)
                );
                let sync_error = SyncError::from_remote(Some(id), err);
                self.rollback(index, &sync_error);
                Err(sync_error)
            }
        }
    }

    /// Issues every dispatchable call against `store` until the queue drains.
    ///
    /// Returns the first failure; later independent calls are still issued.
    pub fn flush<S: RemoteStore + ?Sized>(&mut self, store: &S) -> Result<(), SyncError> {
        let mut first_error = None;
        while let Some(dispatch) = self.next_dispatch() {
            let outcome = dispatch.op.execute(store);
            if let Err(err) = self.complete(dispatch.id, outcome) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Submits `effect` and drives it to completion against `store`.
    pub fn apply<S: RemoteStore + ?Sized>(
        &mut self,
        effect: Effect,
        store: &S,
    ) -> Result<Option<MutationId>, SyncError> {
        let id = self.submit(effect)?;
        self.flush(store)?;
        Ok(id)
    }

    /// Takes the reverted mutations recorded since the last call.
    pub fn drain_failures(&mut self) -> Vec<SyncFailure> {
        std::mem::take(&mut self.failures)
    }

    fn confirm(&mut self, index: usize, ack: RemoteAck) {
        let entry = &mut self.journal[index];
        entry.stage = Stage::Confirmed;
        let id = entry.id;
        let remap = canonical_remap(&entry.op, &ack);

        if let Some(remap) = remap {
            info!(
                "event=sync_reconcile module=sync status=ok mutation={} remap={:?}",
                id, remap
            );
            self.reconcile(&remap);
        } else {
            debug!("event=sync_complete module=sync status=ok mutation={id}");
        }

        self.prune_confirmed();
    }

    /// Drops confirmed entries no open mutation can roll back past.
    fn prune_confirmed(&mut self) {
        let confirmed_prefix = self
            .journal
            .iter()
            .take_while(|entry| !entry.is_open())
            .count();
        self.journal.drain(..confirmed_prefix);
    }

    fn reconcile(&mut self, remap: &IdRemap) {
        self.state = reconcile_ids(&self.state, remap);
        for entry in &mut self.journal {
            entry.before = reconcile_ids(&entry.before, remap);
            entry.effect.remap(remap);
            entry.op.remap(remap);
            for key in &mut entry.locks {
                remap.key(key);
            }
        }
    }

    fn rollback(&mut self, index: usize, cause: &SyncError) {
        let failed = self.journal.remove(index);
        let mut state = failed.before.clone();
        let mut abandoned: HashSet<EntityKey> =
            failed.effect.created_entity().into_iter().collect();
        self.failures.push(SyncFailure {
            mutation: failed.id,
            error: cause.clone(),
        });

        let later: Vec<InFlight> = self.journal.drain(index..).collect();
        for mut entry in later {
            let depends_on_abandoned = entry
                .effect
                .referenced_entities()
                .iter()
                .any(|key| abandoned.contains(key));
            if depends_on_abandoned {
                abandoned.extend(entry.effect.created_entity());
                warn!(
                    "event=sync_rollback module=sync status=dropped mutation={} cause={}",
                    entry.id, failed.id
                );
                self.failures.push(SyncFailure {
                    mutation: entry.id,
                    error: cause.clone(),
                });
                continue;
            }

            let replay = entry.replay_effect(&state);
            entry.before = state.clone();
            match try_reduce(&state, &replay) {
                Ok(next) => state = next,
                Err(err) => warn!(
                    "event=sync_rollback module=sync status=replay_noop mutation={} error_code={}",
                    entry.id,
                    err.code()
                ),
            }
            self.journal.push(entry);
        }

        self.state = state;
        self.prune_confirmed();
        warn!(
            "event=sync_rollback module=sync status=ok mutation={} effect={} remaining={}",
            failed.id,
            failed.effect.name(),
            self.journal.len()
        );
    }
}

fn canonical_remap(op: &RemoteOp, ack: &RemoteAck) -> Option<IdRemap> {
    match (op, ack) {
        (RemoteOp::CreateColumn(sent), RemoteAck::Column(canonical)) if sent.id != canonical.id => {
            Some(IdRemap::Column {
                from: sent.id.clone(),
                to: canonical.id.clone(),
            })
        }
        (RemoteOp::CreateTask { task: sent, .. }, RemoteAck::Task(canonical))
            if sent.id != canonical.id =>
        {
            Some(IdRemap::Task {
                from: sent.id.clone(),
                to: canonical.id.clone(),
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncCoordinator, SyncError};
    use crate::board::effect::{Effect, EntityKey};
    use crate::config::SyncConfig;
    use crate::model::board::BoardState;
    use crate::model::column::{Column, ColumnId};
    use crate::sync::remote::RemoteAck;

    fn coordinator() -> SyncCoordinator {
        SyncCoordinator::new(
            BoardState::hydrate(vec![Column::new("a", "A"), Column::new("b", "B")], Vec::new()),
            &SyncConfig::default(),
        )
    }

    #[test]
    fn unchanged_effect_queues_nothing() {
        let mut sync = coordinator();
        let id = sync
            .submit(Effect::RenameColumn {
                column_id: ColumnId::new("a"),
                title: "A".to_string(),
            })
            .expect("submit should accept the effect");
        assert_eq!(id, None);
        assert!(sync.next_dispatch().is_none());
    }

    #[test]
    fn completing_a_queued_mutation_is_rejected() {
        let mut sync = coordinator();
        let id = sync
            .submit(Effect::ReorderColumns { from: 0, to: 1 })
            .expect("submit should accept the effect")
            .expect("effect should change the board");
        assert_eq!(
            sync.complete(id, Ok(RemoteAck::Done)),
            Err(SyncError::UnknownMutation(id))
        );
    }

    #[test]
    fn lock_is_released_after_confirmation() {
        let mut sync = coordinator();
        let id = sync
            .submit(Effect::ReorderColumns { from: 0, to: 1 })
            .expect("submit should accept the effect")
            .expect("effect should change the board");
        let key = EntityKey::Column(ColumnId::new("a"));
        assert_eq!(sync.lock_owner(&key), Some(id));

        let dispatch = sync.next_dispatch().expect("an op should be ready to dispatch");
        sync.complete(dispatch.id, Ok(RemoteAck::Done)).expect("completion should be accepted");
        assert_eq!(sync.lock_owner(&key), None);
        assert_eq!(sync.in_flight(), 0);
    }
}
