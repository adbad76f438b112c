use clinboard_core::board::reducer::{reduce, try_reduce, ReduceError};
use clinboard_core::{
    BoardState, Column, ColumnId, Effect, EntityKey, Task, TaskId, TaskPosition,
};
use serde_json::Value;
use std::collections::BTreeSet;

fn column_ids(board: &BoardState) -> Vec<&str> {
    board.columns().iter().map(|c| c.id.as_str()).collect()
}

fn task_ids(board: &BoardState, column: &str) -> Vec<String> {
    board
        .task_ids_in(&ColumnId::new(column))
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect()
}

fn three_columns() -> BoardState {
    BoardState::hydrate(
        vec![
            Column::new("A", "Todo"),
            Column::new("B", "Doing"),
            Column::new("C", "Done"),
        ],
        vec![
            Task::new("t1", "A", "one"),
            Task::new("t2", "A", "two"),
            Task::new("t3", "A", "three"),
            Task::new("t4", "B", "four"),
            Task::new("t5", "C", "five"),
        ],
    )
}

#[test]
fn reorder_columns_moves_first_to_last() {
    let board = three_columns();
    let next = reduce(&board, &Effect::ReorderColumns { from: 0, to: 2 });
    assert_eq!(column_ids(&next), vec!["B", "C", "A"]);
    assert_eq!(next.tasks().len(), board.tasks().len());
}

#[test]
fn forward_move_within_column_resolves_against_post_removal_sequence() {
    let board = three_columns();
    let next = reduce(
        &board,
        &Effect::ReorderOrReparentTask {
            task_id: TaskId::new("t1"),
            column_id: ColumnId::new("A"),
            index: 2,
        },
    );
    assert_eq!(task_ids(&next, "A"), vec!["t2", "t3", "t1"]);
}

#[test]
fn reparent_to_end_appends_and_updates_foreign_key() {
    let board = three_columns();
    let next = reduce(
        &board,
        &Effect::ReparentTask {
            task_id: TaskId::new("t1"),
            column_id: ColumnId::new("B"),
            position: TaskPosition::End,
        },
    );
    assert_eq!(task_ids(&next, "A"), vec!["t2", "t3"]);
    assert_eq!(task_ids(&next, "B"), vec!["t4", "t1"]);
    assert_eq!(
        next.task(&TaskId::new("t1")).expect("task should exist").column_id,
        ColumnId::new("B")
    );
    assert_eq!(next.tasks().len(), board.tasks().len());
}

#[test]
fn reparent_at_index_inserts_before_existing_task() {
    let board = three_columns();
    let next = reduce(
        &board,
        &Effect::ReparentTask {
            task_id: TaskId::new("t3"),
            column_id: ColumnId::new("B"),
            position: TaskPosition::Index(0),
        },
    );
    assert_eq!(task_ids(&next, "B"), vec!["t3", "t4"]);
}

#[test]
fn out_of_range_task_index_clamps_to_end() {
    let board = three_columns();
    let next = reduce(
        &board,
        &Effect::ReorderOrReparentTask {
            task_id: TaskId::new("t5"),
            column_id: ColumnId::new("A"),
            index: 40,
        },
    );
    assert_eq!(task_ids(&next, "A"), vec!["t1", "t2", "t3", "t5"]);
    assert!(task_ids(&next, "C").is_empty());
}

#[test]
fn delete_column_cascades_to_its_tasks() {
    let board = BoardState::hydrate(
        vec![Column::new("A", "Todo"), Column::new("B", "Doing")],
        vec![
            Task::new("t1", "A", "one"),
            Task::new("t5", "B", "five"),
            Task::new("t6", "B", "six"),
        ],
    );
    let next = reduce(
        &board,
        &Effect::DeleteColumn {
            column_id: ColumnId::new("B"),
        },
    );
    assert_eq!(column_ids(&next), vec!["A"]);
    assert!(next.task(&TaskId::new("t5")).is_none());
    assert!(next.task(&TaskId::new("t6")).is_none());
    assert!(next.validate().is_ok());
}

#[test]
fn cascade_never_leaves_orphans_for_any_column() {
    let board = three_columns();
    for column in board.columns() {
        let next = reduce(
            &board,
            &Effect::DeleteColumn {
                column_id: column.id.clone(),
            },
        );
        assert!(next.tasks().iter().all(|task| task.column_id != column.id));
        assert!(next.validate().is_ok());
    }
}

#[test]
fn create_task_appends_to_target_column() {
    let board = three_columns();
    let effect = Effect::create_task(ColumnId::new("B"), "follow up", "tmp-");
    let next = reduce(&board, &effect);
    let ids = task_ids(&next, "B");
    assert_eq!(ids.len(), 2);
    assert_eq!(ids[0], "t4");
    assert!(ids[1].starts_with("tmp-"));
}

#[test]
fn create_task_at_index_inserts_and_clamps() {
    let board = three_columns();

    let head = reduce(
        &board,
        &Effect::create_task_at(ColumnId::new("A"), "urgent", TaskPosition::Index(0), "tmp-"),
    );
    let ids = task_ids(&head, "A");
    assert!(ids[0].starts_with("tmp-"));
    assert_eq!(ids[1..], ["t1", "t2", "t3"]);

    let middle = reduce(
        &board,
        &Effect::create_task_at(ColumnId::new("A"), "between", TaskPosition::Index(2), "tmp-"),
    );
    let ids = task_ids(&middle, "A");
    assert_eq!(ids[..2], ["t1", "t2"]);
    assert!(ids[2].starts_with("tmp-"));
    assert_eq!(ids[3], "t3");

    let clamped = reduce(
        &board,
        &Effect::create_task_at(ColumnId::new("B"), "late", TaskPosition::Index(99), "tmp-"),
    );
    let ids = task_ids(&clamped, "B");
    assert_eq!(ids[0], "t4");
    assert!(ids[1].starts_with("tmp-"));
    assert_eq!(task_ids(&clamped, "A"), vec!["t1", "t2", "t3"]);
    assert!(clamped.validate().is_ok());
}

#[test]
fn content_and_rename_edits_keep_order() {
    let board = three_columns();
    let edited = reduce(
        &board,
        &Effect::UpdateTaskContent {
            task_id: TaskId::new("t2"),
            content: "two, revised".to_string(),
        },
    );
    let renamed = reduce(
        &edited,
        &Effect::RenameColumn {
            column_id: ColumnId::new("A"),
            title: "Backlog".to_string(),
        },
    );
    assert_eq!(task_ids(&renamed, "A"), vec!["t1", "t2", "t3"]);
    assert_eq!(
        renamed
            .task(&TaskId::new("t2"))
            .expect("task should exist")
            .content,
        "two, revised"
    );
    assert_eq!(renamed.column(&ColumnId::new("A")).expect("column should exist").title, "Backlog");
}

#[test]
fn metadata_survives_moves() {
    let mut flagged = Task::new("t1", "A", "one");
    flagged
        .metadata
        .insert("flagged".to_string(), Value::Bool(true));
    let board = BoardState::hydrate(
        vec![Column::new("A", "Todo"), Column::new("B", "Doing")],
        vec![flagged.clone()],
    );
    let next = reduce(
        &board,
        &Effect::ReparentTask {
            task_id: TaskId::new("t1"),
            column_id: ColumnId::new("B"),
            position: TaskPosition::End,
        },
    );
    assert_eq!(
        next.task(&TaskId::new("t1")).expect("task should exist").metadata,
        flagged.metadata
    );
}

#[test]
fn unknown_ids_are_reported_and_leave_state_untouched() {
    let board = three_columns();
    let effect = Effect::ReparentTask {
        task_id: TaskId::new("ghost"),
        column_id: ColumnId::new("B"),
        position: TaskPosition::End,
    };
    assert_eq!(
        try_reduce(&board, &effect),
        Err(ReduceError::UnknownEntity(EntityKey::Task(TaskId::new("ghost"))))
    );
    assert_eq!(reduce(&board, &effect), board);

    let into_missing_column = Effect::create_task(ColumnId::new("Z"), "lost", "tmp-");
    assert_eq!(reduce(&board, &into_missing_column), board);
}

#[test]
fn out_of_range_column_reorder_is_rejected() {
    let board = three_columns();
    assert_eq!(
        try_reduce(&board, &Effect::ReorderColumns { from: 0, to: 3 }),
        Err(ReduceError::ColumnIndexOutOfRange { index: 3, len: 3 })
    );
}

#[test]
fn reorder_sequences_never_lose_or_duplicate_ids() {
    let mut board = three_columns();
    let before_columns: BTreeSet<String> = board
        .columns()
        .iter()
        .map(|c| c.id.as_str().to_string())
        .collect();
    let before_tasks: BTreeSet<String> = board
        .tasks()
        .iter()
        .map(|t| t.id.as_str().to_string())
        .collect();

    // Deterministic LCG so failures are reproducible.
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next_rand = |bound: usize| {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        ((seed >> 33) as usize) % bound
    };

    for step in 0..500 {
        let effect = if step % 3 == 0 {
            let len = board.columns().len();
            Effect::ReorderColumns {
                from: next_rand(len),
                to: next_rand(len),
            }
        } else {
            let task = board.tasks()[next_rand(board.tasks().len())].id.clone();
            let column = board.columns()[next_rand(board.columns().len())].id.clone();
            Effect::ReorderOrReparentTask {
                task_id: task,
                column_id: column,
                index: next_rand(6),
            }
        };
        board = reduce(&board, &effect);
        assert!(board.validate().is_ok(), "invalid board after step {step}");
    }

    let after_columns: BTreeSet<String> = board
        .columns()
        .iter()
        .map(|c| c.id.as_str().to_string())
        .collect();
    let after_tasks: Vec<String> = board
        .tasks()
        .iter()
        .map(|t| t.id.as_str().to_string())
        .collect();
    assert_eq!(after_columns, before_columns);
    assert_eq!(after_tasks.len(), before_tasks.len());
    assert_eq!(after_tasks.into_iter().collect::<BTreeSet<_>>(), before_tasks);
}

#[test]
fn context_query_returns_only_linked_tasks() {
    let mut linked = Task::new("t1", "A", "one");
    linked.metadata.insert(
        "relatedContextId".to_string(),
        Value::String("patient-7".to_string()),
    );
    let board = BoardState::hydrate(
        vec![Column::new("A", "Todo")],
        vec![linked, Task::new("t2", "A", "two")],
    );
    let hits: Vec<_> = board
        .tasks_for_context("patient-7")
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(hits, vec!["t1"]);
}
