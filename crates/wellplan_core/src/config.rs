//! Engine configuration.
//!
//! # Responsibility
//! - Collect container, logging and workspace settings in one value.
//! - Resolve settings from `WELLPLAN_*` environment variables.
//!
//! # Invariants
//! - Every setting has a usable default; `from_env` never fails.

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::logging::default_log_level;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_DB_FILE_NAME: &str = "wellplan.sqlite3";
const ENV_DB_PATH: &str = "WELLPLAN_DB_PATH";
const ENV_LOG_LEVEL: &str = "WELLPLAN_LOG_LEVEL";
const ENV_LOG_DIR: &str = "WELLPLAN_LOG_DIR";
const ENV_BUSY_TIMEOUT_MS: &str = "WELLPLAN_BUSY_TIMEOUT_MS";

static DEFAULT_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Interactive workspace behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Name of the well synthesized when the store is empty on first open.
    pub bootstrap_well_name: String,
    /// Name given to automatically created project snapshots.
    pub default_project_name: String,
    /// Create a default project for a selected well that has none.
    pub auto_default_project: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            bootstrap_well_name: "New Well".to_string(),
            default_project_name: "Baseline".to_string(),
            auto_default_project: true,
        }
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub db_path: PathBuf,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` leaves logging to the host.
    pub log_dir: Option<PathBuf>,
    pub busy_timeout: Duration,
    pub workspace: WorkspaceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            workspace: WorkspaceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Reads settings from the process environment over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup` over the defaults.
    ///
    /// Blank values are treated as unset; an unparsable busy timeout keeps
    /// the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(timeout_ms) = read(ENV_BUSY_TIMEOUT_MS).and_then(|raw| raw.parse::<u64>().ok())
        {
            config.busy_timeout = Duration::from_millis(timeout_ms);
        }
        config
    }
}

fn default_db_path() -> PathBuf {
    DEFAULT_DB_PATH
        .get_or_init(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
        .clone()
}
