use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gantt_core::cli::Cli;
use gantt_core::cmd::{self, Commands};
use gantt_core::db::Database;
use gantt_core::history::HistoryLog;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        cmd::cmd_completions(*shell);
        return;
    }

    let db_path = cli.db.unwrap_or_else(|| PathBuf::from("chart.json"));
    let mut db = Database::load(&db_path);

    // Command history never survives a load.
    let mut history = HistoryLog::new();
    history.clear();

    match cli.command {
        Commands::Completions { .. } => unreachable!("handled above"),
        Commands::Tasks { tree } => cmd::cmd_tasks(&db, tree),
        Commands::Add {
            name,
            start,
            end,
            kind,
            parent,
            progress,
            color,
        } => cmd::cmd_add(&mut db, name, start, end, kind, parent, progress, color),
        Commands::Remove { id } => cmd::cmd_remove(&mut db, id),
        Commands::Link {
            from,
            to,
            kind,
            lag,
            cascade,
        } => cmd::cmd_link(&mut db, &mut history, from, to, kind, lag, cascade),
        Commands::Unlink { id } => cmd::cmd_unlink(&mut db, &mut history, id),
        Commands::Edit { id, kind, lag } => cmd::cmd_edit(&mut db, &mut history, id, kind, lag),
        Commands::Deps { task } => cmd::cmd_deps(&db, task),
        Commands::Check { from, to } => cmd::cmd_check(&db, from, to),
        Commands::Order => cmd::cmd_order(&db),
        Commands::Schedule { task } => cmd::cmd_schedule(&mut db, &mut history, task),
        Commands::Violations => cmd::cmd_violations(&db),
        Commands::Move { id, start } => cmd::cmd_move(&mut db, &mut history, id, start),
        Commands::Indent { id } => cmd::cmd_indent(&mut db, &mut history, id),
        Commands::Outdent { id } => cmd::cmd_outdent(&mut db, &mut history, id),
        Commands::Group { name, ids } => cmd::cmd_group(&mut db, &mut history, name, ids),
        Commands::Ungroup { id } => cmd::cmd_ungroup(&mut db, &mut history, id),
        Commands::Hide { ids } => cmd::cmd_hide(&mut db, &mut history, ids),
    }

    if db.dirty {
        if let Err(e) = db.save(&db_path) {
            eprintln!("Failed to save {}: {}", db_path.display(), e);
            std::process::exit(1);
        }
    }
}
