use env_logger::{Builder, Env, Target};
use std::fs::{self, OpenOptions};
use std::path::Path;

pub const LOG_ENV: &str = "DAYBOARD_LOG";
pub const LOG_FILE: &str = "dayboard.log";

/// Routes `log` output to `<dir>/dayboard.log`, since the terminal belongs to
/// the TUI. Logging stays off when the file cannot be opened.
pub fn init(dir: &Path) {
    let file = fs::create_dir_all(dir).and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))
    });
    let file = match file {
        Ok(file) => file,
        Err(_) => return,
    };
    let _ = Builder::from_env(Env::new().filter_or(LOG_ENV, "info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init();
}
