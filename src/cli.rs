use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// File-backed Gantt chart scheduler CLI.
/// Storage defaults to ./chart.json or a path passed via --db.
#[derive(Parser)]
#[command(name = "gantt", version, about = "Gantt chart dependency scheduling CLI")]
pub struct Cli {
    /// Path to the JSON chart file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
