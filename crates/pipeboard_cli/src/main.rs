//! CLI smoke entry point.
//!
//! # Responsibility
//! - Seed an in-memory store, open a board session and run scripted drags.
//! - Keep output deterministic apart from generated ids.
//!
//! Usage: `pipeboard_cli [ABSOLUTE_LOG_DIR]`

use log::{error, info};
use pipeboard_core::{
    core_version, init_logging, open_db_in_memory, BoardConfig, BoardSession, ColumnKey,
    DropTarget, Item, LoggingConfig, PointerHalf, Scope, SqliteGateway,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("pipeboard_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    if let Some(log_dir) = std::env::args().nth(1) {
        init_logging(&LoggingConfig::new(log_dir))?;
    }
    println!("pipeboard_core version={}", core_version());

    let conn = open_db_in_memory()?;
    let mut gateway = SqliteGateway::try_new(&conn)?;
    let scope = Scope::tenant("demo");
    let backlog = ColumnKey::parse("BACKLOG")?;
    let review = ColumnKey::parse("REVIEW")?;

    let mut seeded = Vec::new();
    for (title, position) in [("Harbor survey", 1.0), ("Depot refit", 2.0), ("Fleet telemetry", 3.0)] {
        let item = Item::new(title, backlog.clone(), position, scope.clone());
        gateway.create_item(&item)?;
        seeded.push(item.id);
    }

    let mut session = BoardSession::open(gateway, BoardConfig::default(), scope)?;
    print_board("initial", &session);

    let first = seeded[0];
    let last = seeded[2];
    session.on_drag_start(first);
    let below_last = DropTarget::Item {
        id: last,
        half: PointerHalf::Lower,
    };
    session.on_drag_over(first, &below_last);
    let outcome = session.on_drag_end(first, Some(&below_last));
    info!("event=cli_drag module=cli status=ok outcome={outcome:?}");
    print_board("after reorder", &session);

    session.on_drag_start(last);
    let outcome = session.on_drag_end(last, Some(&DropTarget::Column(review)));
    info!("event=cli_drag module=cli status=ok outcome={outcome:?}");
    print_board("after stage change", &session);

    let mut errors = session.take_errors();
    session.close();
    for err in &errors {
        error!("event=cli_run module=cli status=error error={err}");
    }
    if let Some(err) = errors.pop() {
        return Err(err.into());
    }
    Ok(())
}

fn print_board(label: &str, session: &BoardSession<SqliteGateway<'_>>) {
    println!("== {label}");
    for column in session.columns() {
        let items = session.column_items(&column.key);
        if items.is_empty() {
            continue;
        }
        println!("{} ({})", column.title, items.len());
        for item in items {
            println!("  {:>8} {}", item.position, item.title);
        }
    }
}
