//! Drag session state machine.
//!
//! # Responsibility
//! - Track the gesture in progress: idle, dragging a column, or dragging a
//!   task.
//! - Expose the active entity for preview rendering.
//! - Translate a completed drop into a board `Effect`.
//!
//! # Invariants
//! - A gesture activates only after the pointer travels the configured
//!   activation distance; shorter gestures are clicks.
//! - Columns in inline-rename mode cannot start a drag.
//! - Hover (`over`) never produces an effect; effects are committed on drop
//!   only.
//! - Dropping on nothing, on an unknown entity, or on the source itself
//!   yields no effect.

use crate::board::effect::{Effect, TaskPosition};
use crate::config::DragConfig;
use crate::drag::capability::Draggable;
use crate::model::board::BoardState;
use crate::model::column::{Column, ColumnId};
use crate::model::task::{Task, TaskId};
use log::debug;
use std::collections::HashSet;

/// Pointer location in presentation-layer units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Observable gesture state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragState {
    Idle,
    DraggingColumn(ColumnId),
    DraggingTask(TaskId),
}

/// Entity currently being dragged, resolved against the board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActiveEntity<'a> {
    Column(&'a Column),
    Task(&'a Task),
}

/// Gesture pressed down but not yet past the activation distance.
#[derive(Debug, Clone)]
struct ArmedGesture {
    source: Draggable,
    origin: Point,
}

/// One drag-and-drop session for a board view.
#[derive(Debug, Clone)]
pub struct DragSession {
    activation_distance: f64,
    state: DragState,
    armed: Option<ArmedGesture>,
    over: Option<Draggable>,
    editing: HashSet<ColumnId>,
}

impl DragSession {
    pub fn new(activation_distance: f64) -> Self {
        Self {
            activation_distance,
            state: DragState::Idle,
            armed: None,
            over: None,
            editing: HashSet::new(),
        }
    }

    pub fn from_config(config: &DragConfig) -> Self {
        Self::new(config.activation_distance)
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state != DragState::Idle
    }

    /// Toggles inline-rename mode for one column.
    pub fn set_editing(&mut self, column_id: &ColumnId, editing: bool) {
        if editing {
            self.editing.insert(column_id.clone());
        } else {
            self.editing.remove(column_id);
        }
    }

    pub fn is_editing(&self, column_id: &ColumnId) -> bool {
        self.editing.contains(column_id)
    }

    /// Arms a gesture over `source`. Returns whether the gesture was accepted.
    pub fn start(&mut self, source: Draggable, origin: Point) -> bool {
        if self.is_dragging() || self.armed.is_some() {
            return false;
        }
        if let Draggable::Column(column_id) = &source {
            if self.is_editing(column_id) {
                debug!(
                    "event=drag_start module=drag status=blocked reason=editing column_id={column_id}"
                );
                return false;
            }
        }
        self.armed = Some(ArmedGesture { source, origin });
        true
    }

    /// Feeds pointer movement; activates an armed gesture past the threshold.
    pub fn pointer_moved(&mut self, point: Point) -> &DragState {
        let activate = self
            .armed
            .as_ref()
            .is_some_and(|armed| armed.origin.distance_to(point) >= self.activation_distance);
        if activate {
            if let Some(armed) = self.armed.take() {
                debug!(
                    "event=drag_start module=drag status=ok tag={}",
                    armed.source.tag().as_str()
                );
                self.state = match armed.source {
                    Draggable::Column(id) => DragState::DraggingColumn(id),
                    Draggable::Task(id) => DragState::DraggingTask(id),
                };
            }
        }
        &self.state
    }

    /// Records the hovered target. Informational only.
    pub fn over(&mut self, target: Option<Draggable>) {
        if self.is_dragging() {
            self.over = target;
        }
    }

    /// Target currently hovered, for preview highlighting.
    pub fn hovered(&self) -> Option<&Draggable> {
        self.over.as_ref()
    }

    /// Resolves the dragged entity for preview rendering.
    pub fn active_entity<'a>(&self, board: &'a BoardState) -> Option<ActiveEntity<'a>> {
        match &self.state {
            DragState::Idle => None,
            DragState::DraggingColumn(id) => board.column(id).map(ActiveEntity::Column),
            DragState::DraggingTask(id) => board.task(id).map(ActiveEntity::Task),
        }
    }

    /// Ends the gesture and returns the effect of the drop, if any.
    pub fn end(&mut self, target: Option<Draggable>, board: &BoardState) -> Option<Effect> {
        self.armed = None;
        self.over = None;
        let source = match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Idle => return None,
            DragState::DraggingColumn(id) => Draggable::Column(id),
            DragState::DraggingTask(id) => Draggable::Task(id),
        };

        let effect = target.and_then(|target| resolve_drop(&source, &target, board));
        debug!(
            "event=drag_end module=drag status={} tag={}",
            if effect.is_some() { "ok" } else { "noop" },
            source.tag().as_str()
        );
        effect
    }

    /// Abandons the gesture without an effect.
    pub fn cancel(&mut self) {
        self.armed = None;
        self.over = None;
        self.state = DragState::Idle;
    }
}

/// Computes the effect of dropping `source` on `target`.
pub fn resolve_drop(source: &Draggable, target: &Draggable, board: &BoardState) -> Option<Effect> {
    if source == target {
        return None;
    }
    match (source, target) {
        (Draggable::Column(source_id), Draggable::Column(target_id)) => {
            let from = board.column_index(source_id)?;
            let to = board.column_index(target_id)?;
            Some(Effect::ReorderColumns { from, to })
        }
        (Draggable::Task(task_id), Draggable::Task(target_id)) => {
            board.task(task_id)?;
            let (column_id, index) = board.task_position(target_id)?;
            Some(Effect::ReorderOrReparentTask {
                task_id: task_id.clone(),
                column_id,
                index,
            })
        }
        (Draggable::Task(task_id), Draggable::Column(column_id)) => {
            board.task(task_id)?;
            board.column(column_id)?;
            Some(Effect::ReparentTask {
                task_id: task_id.clone(),
                column_id: column_id.clone(),
                position: TaskPosition::End,
            })
        }
        (Draggable::Column(_), Draggable::Task(_)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{DragSession, DragState, Point};
    use crate::drag::capability::Draggable;
    use crate::model::column::ColumnId;

    #[test]
    fn short_gesture_stays_idle() {
        let mut session = DragSession::new(8.0);
        assert!(session.start(Draggable::Column(ColumnId::new("a")), Point::new(0.0, 0.0)));
        assert_eq!(session.pointer_moved(Point::new(3.0, 4.0)), &DragState::Idle);
        assert_eq!(
            session.pointer_moved(Point::new(6.0, 8.0)),
            &DragState::DraggingColumn(ColumnId::new("a"))
        );
    }

    #[test]
    fn second_start_while_armed_is_ignored() {
        let mut session = DragSession::new(8.0);
        assert!(session.start(Draggable::Column(ColumnId::new("a")), Point::new(0.0, 0.0)));
        assert!(!session.start(Draggable::Column(ColumnId::new("b")), Point::new(0.0, 0.0)));
    }
}
