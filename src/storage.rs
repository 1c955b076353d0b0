use crate::model::TaskStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Plain-text side channel next to the store: one task title per line.
pub const IMPORT_FILE: &str = "import.txt";

const STORE_FILE: &str = "tasks.yml";
const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Flag,
    Configured,
    Default,
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

impl StoreScope {
    pub fn label(&self) -> &'static str {
        match self {
            StoreScope::Flag => "--file",
            StoreScope::Configured => "config",
            StoreScope::Default => "default",
        }
    }
}

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "dayboard").context("locating platform directories")
}

pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
}

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    if data.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(&data).with_context(|| format!("parsing config {:?}", path))
}

pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let serialized = serde_yaml::to_string(config).context("serializing config")?;
    atomic_write(path, serialized.as_bytes())
}

/// Resolves the store path: an explicit `--file` wins, then the config file,
/// then a default under the platform data dir which is remembered in the
/// config for next time.
pub fn locate_store(file_flag: Option<&str>) -> Result<StoreLocation> {
    if let Some(raw) = file_flag {
        return Ok(StoreLocation {
            path: expand_home(raw),
            scope: StoreScope::Flag,
        });
    }
    let cfg_path = config_path()?;
    let mut config = load_config(&cfg_path)?;
    if let Some(path) = config.storage_path.as_ref() {
        return Ok(StoreLocation {
            path: path.clone(),
            scope: StoreScope::Configured,
        });
    }
    let path = project_dirs()?.data_dir().join(STORE_FILE);
    config.storage_path = Some(path.clone());
    save_config(&cfg_path, &config)?;
    log::info!("no storage path configured, defaulting to {:?}", path);
    Ok(StoreLocation {
        path,
        scope: StoreScope::Default,
    })
}

pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(base) = BaseDirs::new() {
            return base.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Reads the store and brings it up to date for `today`: pending imports,
/// rollover, pruning and Future distribution. Any change is written back
/// before returning.
pub fn load_store(path: &Path, today: NaiveDate, visible_days: usize) -> Result<TaskStore> {
    let mut store = read_store(path)?;

    let mut dirty = false;
    if let Some(titles) = take_import_titles(path)? {
        let count = store.import_titles(titles);
        log::info!("imported {} task(s) from {}", count, IMPORT_FILE);
        dirty |= count > 0;
    }
    dirty |= store.normalize(today, visible_days);

    if dirty {
        save_store(path, &store)?;
    }
    log::info!(
        "loaded {} task(s) from {:?} (normalized: {})",
        store.task_count(),
        path,
        dirty
    );
    Ok(store)
}

fn read_store(path: &Path) -> Result<TaskStore> {
    if !path.exists() {
        return Ok(TaskStore::new());
    }
    let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    if data.trim().is_empty() {
        return Ok(TaskStore::new());
    }
    serde_yaml::from_str(&data).with_context(|| format!("parsing task file {:?}", path))
}

pub fn import_path(store_path: &Path) -> PathBuf {
    store_path
        .parent()
        .map(|dir| dir.join(IMPORT_FILE))
        .unwrap_or_else(|| PathBuf::from(IMPORT_FILE))
}

/// Consumes the import file if present. The file is deleted even when it only
/// holds blank lines.
fn take_import_titles(store_path: &Path) -> Result<Option<Vec<String>>> {
    let path = import_path(store_path);
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
    let titles = data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    fs::remove_file(&path).with_context(|| format!("removing {:?}", path))?;
    Ok(Some(titles))
}

pub fn save_store(path: &Path, store: &TaskStore) -> Result<()> {
    let serialized = serde_yaml::to_string(store).context("serializing tasks")?;
    atomic_write(path, serialized.as_bytes())?;
    log::debug!("saved {} task(s) to {:?}", store.task_count(), path);
    Ok(())
}

/// Copies the store file to `dest` without touching the original.
pub fn copy_store(src: &Path, dest: &Path) -> Result<()> {
    let data = fs::read(src).with_context(|| format!("reading {:?}", src))?;
    atomic_write(dest, &data)
}

/// Writes `content` to `path` through a synced, owner-only temp file in the
/// same directory and renames it into place. The temp file is removed on any
/// failure and the destination keeps its previous content.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {:?}", dir))?;
    tmp.write_all(content)
        .with_context(|| format!("writing {:?}", tmp.path()))?;
    tmp.flush()?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("syncing {:?}", tmp.path()))?;
    restrict_permissions(tmp.path())?;
    tmp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("replacing {:?}", path))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("restricting permissions on {:?}", path))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
