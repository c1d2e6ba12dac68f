//! Maintenance helpers for feature archives and annotation tables.

mod inspect;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "melpack-tools", about = "Inspect melpack archives and label tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print archive metadata, split sizes, and per-track chunk counts.
    Inspect { archive: PathBuf },
    /// Print split counts and the hour histogram of an annotations.csv.
    Labels { table: PathBuf },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Inspect { archive } => inspect::archive(&archive),
        Command::Labels { table } => inspect::labels(&table),
    }
}
