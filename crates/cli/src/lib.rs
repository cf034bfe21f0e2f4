pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "mandi",
    about = "Mandi recommendation-engine operator CLI",
    long_about = "Apply migrations, load demo fixtures, inspect effective configuration, and check service readiness.",
    after_help = "Examples:\n  mandi migrate\n  mandi seed\n  mandi doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending database migrations and verify the baseline schema
    Migrate,
    /// Load the deterministic marketplace fixtures and verify them
    Seed,
    /// Print the effective configuration as JSON
    Config,
    /// Check config, database connectivity, and scoring-service settings
    Doctor {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn execute(self) -> CommandResult {
        match self {
            Command::Migrate => commands::migrate::run(),
            Command::Seed => commands::seed::run(),
            Command::Config => CommandResult { exit_code: 0, output: commands::config::run() },
            Command::Doctor { json } => {
                CommandResult { exit_code: 0, output: commands::doctor::run(json) }
            }
        }
    }
}

pub fn run() -> ExitCode {
    let result = Cli::parse().command.execute();
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
