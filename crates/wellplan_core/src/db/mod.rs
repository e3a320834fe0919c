//! Shared SQLite container file: connection setup and schema.
//!
//! Every store context owns one connection produced here. All of them point
//! at the same file, so the pragmas that make several live connections safe
//! (busy timeout, WAL, enforced foreign keys) are applied on each open, and
//! the schema is brought to `migrations::latest_version()` before a context
//! sees any rows.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod migrations;
mod open;

pub use open::{open_db, open_db_with_timeout, DEFAULT_BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or migrating the container file.
#[derive(Debug)]
pub enum DbError {
    /// The file could not be opened at all.
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    /// A connection pragma was rejected.
    Pragma {
        pragma: &'static str,
        source: rusqlite::Error,
    },
    /// One migration step failed; nothing of it was applied.
    Migration {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Any other statement error on an open connection.
    Sqlite(rusqlite::Error),
}

impl DbError {
    /// Stable code for `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "db_open_failed",
            Self::Pragma { .. } => "db_pragma_failed",
            Self::Migration { .. } => "db_migration_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
            Self::Sqlite(_) => "db_statement_failed",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "cannot open well database `{}`: {source}", path.display())
            }
            Self::Pragma { pragma, source } => write!(f, "pragma `{pragma}` failed: {source}"),
            Self::Migration {
                version,
                name,
                source,
            } => write!(f, "schema migration {version} ({name}) failed: {source}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "well database schema {db_version} is newer than this build supports ({latest_supported})"
            ),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. }
            | Self::Pragma { source, .. }
            | Self::Migration { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
