use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "dayboard",
    version,
    about = "Terminal task tracker with a rolling window of days"
)]
pub struct Cli {
    /// Path to the task file (overrides the configured location)
    #[arg(long, global = true)]
    pub file: Option<String>,
    /// Number of day columns to show, starting today
    #[arg(
        long,
        global = true,
        default_value_t = 3,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub days: u16,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or change where tasks are stored
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the configured storage path
    Show,
    /// Move the task file to a new path and remember it
    Move {
        /// Destination path for the task file
        path: String,
    },
}
