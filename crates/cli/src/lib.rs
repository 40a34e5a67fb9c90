pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "roamcat",
    about = "Roamcat operator CLI",
    long_about = "Operate the Roamcat catalogue service: migrations, config inspection, readiness checks, and the stored catalogue snapshot.",
    after_help = "Examples:\n  roamcat doctor --json\n  roamcat config\n  roamcat snapshot --delete"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, upstream API key readiness, DB connectivity and snapshot state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect the stored catalogue snapshot, or drop it to force a full rebuild")]
    Snapshot {
        #[arg(long, help = "Delete the stored snapshot")]
        delete: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Snapshot { delete } => commands::snapshot::run(delete),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
