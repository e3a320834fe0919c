//! Engine logging backend.
//!
//! # Responsibility
//! - Start the `flexi_logger` file backend once per process from `EngineConfig`.
//! - Record panics, tagging those raised on background deletion threads.
//!
//! # Invariants
//! - Log lines are metadata only: `event=... module=... status=...` with ids
//!   and counts. Well and project names never reach a log line.
//! - A second start with other settings is rejected; the same settings are a no-op.
//! - Nothing in here panics.

use crate::cascade::DELETION_THREAD_PREFIX;
use crate::config::EngineConfig;
use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Once;

const LOG_FILE_BASENAME: &str = "wellplan";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: Once = Once::new();

/// Validated backend settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: &'static str,
    pub dir: PathBuf,
}

impl LogSettings {
    /// Validates the logging part of `config`.
    ///
    /// Returns `Ok(None)` when no log directory is configured.
    pub fn from_config(config: &EngineConfig) -> Result<Option<Self>, LoggingError> {
        let Some(dir) = config.log_dir.as_deref() else {
            return Ok(None);
        };
        Ok(Some(Self {
            level: parse_level(&config.log_level)?,
            dir: validate_dir(dir)?,
        }))
    }
}

/// Why the backend could not be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    UnsupportedLevel(String),
    RelativeDir(PathBuf),
    /// Already running with different settings.
    Conflict { active: LogSettings },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::RelativeDir(dir) => {
                write!(f, "log directory must be absolute, got `{}`", dir.display())
            }
            Self::Conflict { active } => write!(
                f,
                "logging already active at `{}` with level `{}`; refusing to switch",
                active.dir.display(),
                active.level
            ),
            Self::Backend(message) => write!(f, "log backend failed: {message}"),
        }
    }
}

impl Error for LoggingError {}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts file logging as configured.
///
/// Returns `Ok(false)` without touching the backend when `config.log_dir` is
/// unset, so an embedding host can install its own `log` implementation.
pub fn init_logging_from_config(config: &EngineConfig) -> Result<bool, LoggingError> {
    match LogSettings::from_config(config)? {
        Some(settings) => init_logging(settings).map(|()| true),
        None => Ok(false),
    }
}

/// Starts file logging with `settings`.
pub fn init_logging(settings: LogSettings) -> Result<(), LoggingError> {
    let active = ACTIVE.get_or_try_init(|| start_backend(&settings))?;
    if active.settings != settings {
        return Err(LoggingError::Conflict {
            active: active.settings.clone(),
        });
    }
    Ok(())
}

/// Settings of the running backend, if any.
pub fn active_log_settings() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

/// Default level for the current build mode.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_backend(settings: &LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|err| {
        LoggingError::Backend(format!(
            "cannot create `{}`: {err}",
            settings.dir.display()
        ))
    })?;

    let handle = Logger::try_with_str(settings.level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .duplicate_to_stderr(Duplicate::Error)
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    PANIC_HOOK.call_once(install_panic_hook);
    info!(
        "event=engine_start module=core status=ok level={} platform={} version={}",
        settings.level,
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let module = panic_module(thread_name);
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
            sanitize_message(message, MAX_PANIC_PAYLOAD_CHARS)
        } else if let Some(message) = info.payload().downcast_ref::<String>() {
            sanitize_message(message, MAX_PANIC_PAYLOAD_CHARS)
        } else {
            "non-string panic payload".to_string()
        };
        error!(
            "event=panic_captured module={} status=error thread={} location={} payload={}",
            module,
            sanitize_message(thread_name, 64),
            location,
            payload
        );
        previous(info);
    }));
}

/// Deletion threads report as `cascade`; their panic is also turned into a
/// failed outcome by the dispatcher.
fn panic_module(thread_name: &str) -> &'static str {
    if thread_name.starts_with(DELETION_THREAD_PREFIX) {
        "cascade"
    } else {
        "core"
    }
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn validate_dir(dir: &Path) -> Result<PathBuf, LoggingError> {
    if !dir.is_absolute() {
        return Err(LoggingError::RelativeDir(dir.to_path_buf()));
    }
    Ok(dir.to_path_buf())
}

/// Flattens newlines and caps `value` at `max_chars` characters.
pub(crate) fn sanitize_message(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    let mut capped: String = flat.chars().take(max_chars).collect();
    if flat.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::{
        active_log_settings, init_logging, init_logging_from_config, panic_module, parse_level,
        sanitize_message, LogSettings, LoggingError,
    };
    use crate::config::EngineConfig;
    use std::path::PathBuf;

    fn config_with(level: &str, dir: Option<&str>) -> EngineConfig {
        EngineConfig {
            log_level: level.to_string(),
            log_dir: dir.map(PathBuf::from),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn levels_are_normalized() {
        assert_eq!(parse_level(" WARNING "), Ok("warn"));
        assert_eq!(parse_level("Info"), Ok("info"));
        assert_eq!(
            parse_level("loud"),
            Err(LoggingError::UnsupportedLevel("loud".to_string()))
        );
    }

    #[test]
    fn settings_require_an_absolute_directory() {
        assert_eq!(LogSettings::from_config(&config_with("info", None)), Ok(None));
        assert!(matches!(
            LogSettings::from_config(&config_with("info", Some("logs/dev"))),
            Err(LoggingError::RelativeDir(_))
        ));
    }

    #[test]
    fn missing_directory_leaves_the_backend_alone() {
        assert_eq!(init_logging_from_config(&config_with("info", None)), Ok(false));
    }

    #[test]
    fn deletion_thread_panics_are_tagged() {
        assert_eq!(panic_module("wellplan-deletion-7"), "cascade");
        assert_eq!(panic_module("main"), "core");
    }

    #[test]
    fn sanitize_flattens_and_caps() {
        let sanitized = sanitize_message("line1\nline2\rline3", 8);
        assert_eq!(sanitized, "line1 li...");
        assert_eq!(sanitize_message("ok", 8), "ok");
    }

    #[test]
    fn restart_with_same_settings_is_a_no_op_and_conflicts_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = EngineConfig {
            log_level: "info".to_string(),
            log_dir: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        };

        assert_eq!(init_logging_from_config(&config), Ok(true));
        assert_eq!(init_logging_from_config(&config), Ok(true));

        let louder = EngineConfig {
            log_level: "debug".to_string(),
            ..config.clone()
        };
        assert!(matches!(
            init_logging_from_config(&louder),
            Err(LoggingError::Conflict { .. })
        ));

        let other_dir = LogSettings {
            level: "info",
            dir: dir.path().join("elsewhere"),
        };
        assert!(matches!(
            init_logging(other_dir),
            Err(LoggingError::Conflict { .. })
        ));
        assert_eq!(
            active_log_settings().map(|settings| settings.dir),
            Some(dir.path().to_path_buf())
        );
    }
}
