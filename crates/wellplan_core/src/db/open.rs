//! Per-context connection bootstrap.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`, WAL journaling and a busy
//!   timeout, and the schema is at the latest version.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Busy timeout used when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the container file with the default busy timeout.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
}

/// Opens one context connection on the container file.
///
/// # Side effects
/// - Switches the file to WAL journaling on first open.
/// - Applies pending migrations.
pub fn open_db_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();

    let result = Connection::open(path)
        .map_err(|source| DbError::Open {
            path: path.to_path_buf(),
            source,
        })
        .and_then(|mut conn| {
            configure(&conn, busy_timeout)?;
            apply_migrations(&mut conn)?;
            Ok(conn)
        });

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok busy_timeout_ms={} duration_ms={}",
            busy_timeout.as_millis(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error error_code={} duration_ms={} error={}",
            err.code(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn configure(conn: &Connection, busy_timeout: Duration) -> DbResult<()> {
    // Busy timeout first: another context may be migrating the same file.
    conn.busy_timeout(busy_timeout)
        .map_err(|source| DbError::Pragma {
            pragma: "busy_timeout",
            source,
        })?;
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(|source| DbError::Pragma {
            pragma: "foreign_keys",
            source,
        })?;
    let mode: String = conn
        .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
        .map_err(|source| DbError::Pragma {
            pragma: "journal_mode",
            source,
        })?;
    if !mode.eq_ignore_ascii_case("wal") {
        info!("event=db_open module=db status=skip reason=wal_unavailable journal_mode={mode}");
    }
    Ok(())
}
