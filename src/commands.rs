use crate::storage::{
    config_path, copy_store, expand_home, load_config, load_store, locate_store, save_config,
};
use crate::ui;
use anyhow::{bail, Context, Result};
use chrono::Local;
use std::fs;

pub fn tui(file: Option<String>, visible_days: usize) -> Result<()> {
    let location = locate_store(file.as_deref())?;
    let today = Local::now().date_naive();
    let store = load_store(&location.path, today, visible_days)
        .with_context(|| format!("loading tasks from {}", location.path.display()))?;
    ui::run(store, location, visible_days)
}

pub fn config_show() -> Result<()> {
    let config = load_config(&config_path()?)?;
    match config.storage_path {
        Some(path) => println!("Storage Path: {}", path.display()),
        None => println!("Storage Path: (not configured)"),
    }
    Ok(())
}

/// Copies the task file to `raw_path`, points the config at it and only then
/// removes the old file, so a failed config write never loses data.
pub fn config_move(raw_path: String) -> Result<()> {
    let cfg_path = config_path()?;
    let mut config = load_config(&cfg_path)?;
    let old_path = match config.storage_path.clone() {
        Some(path) => path,
        None => bail!("no storage path currently configured"),
    };
    let new_path = expand_home(&raw_path);
    if new_path == old_path {
        println!("Storage already at {}", new_path.display());
        return Ok(());
    }

    copy_store(&old_path, &new_path)
        .with_context(|| format!("copying tasks to {}", new_path.display()))?;
    config.storage_path = Some(new_path.clone());
    save_config(&cfg_path, &config).context("saving config")?;

    if let Err(err) = fs::remove_file(&old_path) {
        log::warn!("could not remove {:?}: {}", old_path, err);
        println!(
            "Warning: could not remove old file {}: {}",
            old_path.display(),
            err
        );
    }
    log::info!("moved storage from {:?} to {:?}", old_path, new_path);
    println!("Moved storage to {}", new_path.display());
    Ok(())
}
