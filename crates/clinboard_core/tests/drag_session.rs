use clinboard_core::config::{CoreConfig, DragConfig};
use clinboard_core::drag::capability::CapabilityTagError;
use clinboard_core::drag::session::{resolve_drop, ActiveEntity};
use clinboard_core::{
    BoardState, Column, ColumnId, DragSession, DragState, Draggable, Effect, Point, Task, TaskId,
    TaskPosition,
};

fn board() -> BoardState {
    BoardState::hydrate(
        vec![Column::new("A", "Todo"), Column::new("B", "Doing")],
        vec![
            Task::new("t1", "A", "one"),
            Task::new("t2", "A", "two"),
            Task::new("t4", "B", "four"),
        ],
    )
}

fn column(id: &str) -> Draggable {
    Draggable::Column(ColumnId::new(id))
}

fn task(id: &str) -> Draggable {
    Draggable::Task(TaskId::new(id))
}

fn dragging(source: Draggable) -> DragSession {
    let mut session = DragSession::from_config(&DragConfig::default());
    assert!(session.start(source, Point::new(10.0, 10.0)));
    session.pointer_moved(Point::new(30.0, 10.0));
    assert!(session.is_dragging());
    session
}

#[test]
fn click_without_travel_never_activates() {
    let board = board();
    let mut session = DragSession::new(8.0);
    session.start(task("t1"), Point::new(0.0, 0.0));
    session.pointer_moved(Point::new(2.0, 2.0));
    assert_eq!(session.state(), &DragState::Idle);
    assert_eq!(session.end(Some(task("t2")), &board), None);
}

#[test]
fn column_on_column_reorders_by_current_indices() {
    let board = board();
    let mut session = dragging(column("A"));
    assert_eq!(session.state(), &DragState::DraggingColumn(ColumnId::new("A")));
    assert_eq!(
        session.end(Some(column("B")), &board),
        Some(Effect::ReorderColumns { from: 0, to: 1 })
    );
    assert_eq!(session.state(), &DragState::Idle);
}

#[test]
fn task_on_task_targets_the_hovered_slot() {
    let board = board();
    let mut session = dragging(task("t1"));
    assert_eq!(
        session.end(Some(task("t4")), &board),
        Some(Effect::ReorderOrReparentTask {
            task_id: TaskId::new("t1"),
            column_id: ColumnId::new("B"),
            index: 0,
        })
    );
}

#[test]
fn task_on_column_appends() {
    let board = board();
    let mut session = dragging(task("t2"));
    assert_eq!(
        session.end(Some(column("B")), &board),
        Some(Effect::ReparentTask {
            task_id: TaskId::new("t2"),
            column_id: ColumnId::new("B"),
            position: TaskPosition::End,
        })
    );
}

#[test]
fn self_drops_and_invalid_targets_are_no_ops() {
    let board = board();
    for source in [column("A"), task("t1")] {
        let mut session = dragging(source.clone());
        assert_eq!(session.end(Some(source), &board), None);
    }

    let mut session = dragging(column("A"));
    assert_eq!(session.end(Some(task("t4")), &board), None);

    let mut session = dragging(task("t1"));
    assert_eq!(session.end(None, &board), None);

    let mut session = dragging(task("t1"));
    assert_eq!(session.end(Some(task("gone")), &board), None);
}

#[test]
fn hover_is_preview_only() {
    let board = board();
    let mut session = dragging(task("t1"));
    session.over(Some(task("t4")));
    assert_eq!(session.hovered(), Some(&task("t4")));
    assert_eq!(session.state(), &DragState::DraggingTask(TaskId::new("t1")));

    session.cancel();
    assert_eq!(session.hovered(), None);
    assert_eq!(session.end(Some(task("t4")), &board), None);
}

#[test]
fn editing_column_cannot_start_a_drag() {
    let mut session = DragSession::new(8.0);
    let id = ColumnId::new("A");
    session.set_editing(&id, true);
    assert!(!session.start(column("A"), Point::new(0.0, 0.0)));

    session.set_editing(&id, false);
    assert!(session.start(column("A"), Point::new(0.0, 0.0)));
}

#[test]
fn active_entity_resolves_the_dragged_payload() {
    let board = board();
    let session = dragging(task("t2"));
    match session.active_entity(&board) {
        Some(ActiveEntity::Task(task)) => assert_eq!(task.content, "two"),
        other => panic!("unexpected active entity: {other:?}"),
    }
}

#[test]
fn activation_distance_comes_from_config() {
    let config = CoreConfig::from_json_str(r#"{"drag": {"activation_distance": 50}}"#)
        .expect("config should parse");
    let mut session = DragSession::from_config(&config.drag);
    session.start(task("t1"), Point::new(0.0, 0.0));
    assert_eq!(session.pointer_moved(Point::new(30.0, 30.0)), &DragState::Idle);
    assert_eq!(
        session.pointer_moved(Point::new(30.0, 40.0)),
        &DragState::DraggingTask(TaskId::new("t1"))
    );
}

#[test]
fn tagged_payloads_parse_into_draggables() {
    assert_eq!(Draggable::from_tagged("Column", "A"), Ok(column("A")));
    assert_eq!(Draggable::from_tagged("Task", "t1"), Ok(task("t1")));
    assert_eq!(
        Draggable::from_tagged("Card", "t1"),
        Err(CapabilityTagError::Unsupported("Card".to_string()))
    );
}

#[test]
fn resolve_drop_is_usable_without_a_session() {
    let board = board();
    assert_eq!(
        resolve_drop(&task("t2"), &task("t1"), &board),
        Some(Effect::ReorderOrReparentTask {
            task_id: TaskId::new("t2"),
            column_id: ColumnId::new("A"),
            index: 0,
        })
    );
}
