mod app;
mod cli;
mod commands;
mod input;
mod logging;
mod model;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    if let Ok(dirs) = storage::project_dirs() {
        logging::init(dirs.data_dir());
    }
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Config { action } => match action {
            cli::ConfigAction::Show => commands::config_show(),
            cli::ConfigAction::Move { path } => commands::config_move(path),
        },
        cli::Command::Tui => commands::tui(args.file, args.days as usize),
    }
}
