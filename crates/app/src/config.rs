use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";
const DB_FILE: &str = "tally.db";
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Optional user settings read from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Database file used when no `--db` / `TALLY_DB` is given.
    pub database: Option<PathBuf>,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl Settings {
    /// Loads the platform config file. A missing file (or no resolvable
    /// config directory) yields defaults.
    pub fn load() -> Result<Self> {
        match project_dirs() {
            Some(dirs) => Self::load_from(&dirs.config_dir().join(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// `--db`/`TALLY_DB`, then the config file, then the platform data dir.
    pub fn resolve_db_path(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = flag.or_else(|| self.database.clone()) {
            return Ok(path);
        }
        let dirs = project_dirs().context("Failed to determine the data directory")?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create {}", data_dir.display()))?;
        Ok(data_dir.join(DB_FILE))
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "tally", "Tally")
}
