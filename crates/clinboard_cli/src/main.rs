//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `clinboard_core` linkage and print a board summary.
//! - With a database path, summarize that board; without one, seed an
//!   in-memory demo board through the sync coordinator.

use clap::Parser;
use clinboard_core::config::CoreConfig;
use clinboard_core::logging::init_logging_from_config;
use clinboard_core::{BoardState, Effect, SyncCoordinator, TaskPosition};
use clinboard_store::{open_db, open_db_in_memory, SqliteBoardStore};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

/// Clinical task board smoke client
#[derive(Parser, Debug)]
#[command(name = "clinboard_cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON config file (drag, sync and logging sections)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Board database to summarize; a demo board is seeded in memory when omitted
    #[arg(value_name = "DB_PATH")]
    db_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    println!("clinboard_core ping={}", clinboard_core::ping());
    println!("clinboard_core version={}", clinboard_core::core_version());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Cli) -> Result<(), Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    init_logging_from_config(&config.logging)?;

    let conn = match &args.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let store = SqliteBoardStore::try_new(&conn)?;
    let mut sync = SyncCoordinator::new(BoardState::new(), &config.sync);
    sync.hydrate(&store)?;

    if args.db_path.is_none() {
        seed_demo(&mut sync, &store)?;
    }
    info!(
        "event=cli_run module=cli status=ok columns={} tasks={}",
        sync.state().columns().len(),
        sync.state().tasks().len()
    );
    print_summary(sync.state());
    Ok(())
}

fn seed_demo(
    sync: &mut SyncCoordinator,
    store: &SqliteBoardStore<'_>,
) -> Result<(), Box<dyn Error>> {
    let prefix = sync.temp_id_prefix().to_string();
    for title in ["Todo", "In progress", "Done"] {
        sync.apply(Effect::create_column(title, &prefix), store)?;
    }

    let columns: Vec<_> = sync.state().columns().iter().map(|c| c.id.clone()).collect();
    let (Some(todo), Some(doing)) = (columns.first(), columns.get(1)) else {
        return Ok(());
    };
    for content in ["Review overnight labs", "Update care plan", "Call pharmacy"] {
        sync.apply(Effect::create_task(todo.clone(), content, &prefix), store)?;
    }

    if let Some(first) = sync.state().task_ids_in(todo).first().cloned() {
        sync.apply(
            Effect::ReparentTask {
                task_id: first,
                column_id: doing.clone(),
                position: TaskPosition::End,
            },
            store,
        )?;
    }
    Ok(())
}

fn print_summary(board: &BoardState) {
    println!(
        "board columns={} tasks={}",
        board.columns().len(),
        board.tasks().len()
    );
    for column in board.columns() {
        println!("- {} [{}]", column.title, column.id);
        for task in board.tasks_in(&column.id) {
            println!("    * {}", task.content);
        }
    }
}
