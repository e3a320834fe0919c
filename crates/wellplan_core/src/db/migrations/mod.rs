//! Schema migrations for the well database.
//!
//! Steps are tracked through `PRAGMA user_version`. Owned tables reference
//! their owner without `ON DELETE CASCADE`; removing a graph is the cascade
//! planner's job.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "wells",
        sql: include_str!("0001_wells.sql"),
    },
    Migration {
        version: 2,
        name: "snapshot_collections",
        sql: include_str!("0002_snapshot_collections.sql"),
    },
    Migration {
        version: 3,
        name: "transfers_rentals",
        sql: include_str!("0003_transfers_rentals.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the schema on `conn` up to [`latest_version`].
///
/// Concurrent openers of a fresh file serialize on an immediate
/// transaction; whoever comes second finds nothing left to apply.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let latest = latest_version();
    if check_version(user_version(conn)?, latest)? == latest {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let locked = check_version(user_version(&tx)?, latest)?;
    let pending = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > locked);
    for migration in pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", migration.version))
            .map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;
    Ok(())
}

fn check_version(current: u32, latest: u32) -> DbResult<u32> {
    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    Ok(current)
}

fn user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?)
}
