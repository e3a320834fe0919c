//! SQLite-backed container and store contexts.
//!
//! # Responsibility
//! - Open one connection per context on the shared database file.
//! - Stage writes in a lazily opened immediate transaction.
//! - Keep SQL and row parsing inside the store boundary.
//!
//! # Invariants
//! - Listings are deterministic: `created_at ASC, uuid ASC`.
//! - A context dropped with staged writes rolls them back.
//! - Change notices are published only after `COMMIT` succeeded.

use super::feed::{ChangeFeed, ChangeListener};
use super::{ContextOrigin, EntityStore, StoreContainer, StoreError, StoreResult, WellQuery};
use crate::db::{open_db_with_timeout, DEFAULT_BUSY_TIMEOUT};
use crate::model::clock::next_timestamp_ms;
use crate::model::kind::EntityKind;
use crate::model::well::{
    BaselineParameters, EntityId, OwnedRecord, ProjectId, ProjectState, Well, WellId,
};
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const WELL_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    created_at,
    updated_at
FROM wells";

const PROJECT_SELECT_SQL: &str = "SELECT
    uuid,
    well_uuid,
    name,
    bit_depth_m,
    hole_diameter_mm,
    mud_density_kg_m3,
    pump_rate_l_min,
    created_at,
    updated_at
FROM project_states";

/// Shared SQLite container. Cheap to share behind an `Arc`.
pub struct SqliteContainer {
    path: PathBuf,
    busy_timeout: Duration,
    feed: Arc<ChangeFeed>,
}

impl SqliteContainer {
    /// Opens (and migrates) the container at `path` with the default busy timeout.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens (and migrates) the container at `path`.
    ///
    /// One throwaway connection is opened and closed so schema problems surface
    /// here instead of inside a background task.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        drop(open_db_with_timeout(&path, busy_timeout)?);
        Ok(Self {
            path,
            busy_timeout,
            feed: Arc::new(ChangeFeed::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Latest published commit generation.
    pub fn generation(&self) -> u64 {
        self.feed.generation()
    }
}

impl StoreContainer for SqliteContainer {
    type Context = SqliteContext;

    fn open_context(&self, origin: ContextOrigin) -> StoreResult<SqliteContext> {
        let conn = open_db_with_timeout(&self.path, self.busy_timeout)?;
        debug!(
            "event=context_open module=store status=ok origin={}",
            origin.label()
        );
        Ok(SqliteContext {
            conn,
            origin,
            feed: Arc::clone(&self.feed),
            staged: false,
        })
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.feed.subscribe(listener);
    }
}

/// One isolated store context over the shared container.
pub struct SqliteContext {
    conn: Connection,
    origin: ContextOrigin,
    feed: Arc<ChangeFeed>,
    staged: bool,
}

impl SqliteContext {
    pub fn origin(&self) -> ContextOrigin {
        self.origin
    }

    /// Raw connection access for diagnostics and tests.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn begin_write(&mut self) -> StoreResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        }
        self.staged = true;
        Ok(())
    }

    fn row_exists(&self, kind: EntityKind, id: EntityId) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE uuid = ?1);",
                kind.table()
            ),
            [id.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

impl Drop for SqliteContext {
    fn drop(&mut self) {
        if !self.conn.is_autocommit() {
            if let Err(err) = self.conn.execute_batch("ROLLBACK;") {
                warn!(
                    "event=context_drop module=store status=error origin={} error={}",
                    self.origin.label(),
                    err
                );
            }
        }
    }
}

impl EntityStore for SqliteContext {
    fn begin(&mut self) -> StoreResult<()> {
        self.begin_write()
    }

    fn insert_well(&mut self, well: &Well) -> StoreResult<()> {
        self.begin_write()?;
        self.conn.execute(
            "INSERT INTO wells (
                uuid,
                name,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                well.uuid.to_string(),
                well.name.as_str(),
                well.created_at,
                well.updated_at,
            ],
        )?;
        Ok(())
    }

    fn insert_project(&mut self, project: &ProjectState) -> StoreResult<()> {
        if !self.row_exists(EntityKind::Well, project.well_uuid)? {
            return Err(StoreError::MissingOwner {
                kind: EntityKind::ProjectState,
                owner_uuid: project.well_uuid,
            });
        }
        self.begin_write()?;
        self.conn.execute(
            "INSERT INTO project_states (
                uuid,
                well_uuid,
                name,
                bit_depth_m,
                hole_diameter_mm,
                mud_density_kg_m3,
                pump_rate_l_min,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                project.uuid.to_string(),
                project.well_uuid.to_string(),
                project.name.as_str(),
                project.baseline.bit_depth_m,
                project.baseline.hole_diameter_mm,
                project.baseline.mud_density_kg_m3,
                project.baseline.pump_rate_l_min,
                project.created_at,
                project.updated_at,
            ],
        )?;
        Ok(())
    }

    fn insert_record(&mut self, record: &OwnedRecord) -> StoreResult<()> {
        let (Some(owner_kind), Some(owner_column)) =
            (record.kind.owner_kind(), record.kind.owner_column())
        else {
            return Err(StoreError::UnsupportedKind(record.kind));
        };
        if !record.kind.is_record() {
            return Err(StoreError::UnsupportedKind(record.kind));
        }
        if !self.row_exists(owner_kind, record.owner_uuid)? {
            return Err(StoreError::MissingOwner {
                kind: record.kind,
                owner_uuid: record.owner_uuid,
            });
        }
        self.begin_write()?;
        self.conn.execute(
            &format!(
                "INSERT INTO {} (
                    uuid,
                    {owner_column},
                    label,
                    amount,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5);",
                record.kind.table()
            ),
            params![
                record.uuid.to_string(),
                record.owner_uuid.to_string(),
                record.label.as_str(),
                record.amount,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn update_well_name(&mut self, id: WellId, name: &str) -> StoreResult<()> {
        self.begin_write()?;
        let changed = self.conn.execute(
            "UPDATE wells
             SET name = ?2,
                 updated_at = ?3
             WHERE uuid = ?1;",
            params![id.to_string(), name, next_timestamp_ms()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: EntityKind::Well,
                id,
            });
        }
        Ok(())
    }

    fn update_project(&mut self, project: &ProjectState) -> StoreResult<()> {
        if !self.row_exists(EntityKind::Well, project.well_uuid)? {
            return Err(StoreError::MissingOwner {
                kind: EntityKind::ProjectState,
                owner_uuid: project.well_uuid,
            });
        }
        self.begin_write()?;
        let changed = self.conn.execute(
            "UPDATE project_states
             SET well_uuid = ?2,
                 name = ?3,
                 bit_depth_m = ?4,
                 hole_diameter_mm = ?5,
                 mud_density_kg_m3 = ?6,
                 pump_rate_l_min = ?7,
                 updated_at = ?8
             WHERE uuid = ?1;",
            params![
                project.uuid.to_string(),
                project.well_uuid.to_string(),
                project.name.as_str(),
                project.baseline.bit_depth_m,
                project.baseline.hole_diameter_mm,
                project.baseline.mud_density_kg_m3,
                project.baseline.pump_rate_l_min,
                next_timestamp_ms(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound {
                kind: EntityKind::ProjectState,
                id: project.uuid,
            });
        }
        Ok(())
    }

    fn delete_by_identity(&mut self, kind: EntityKind, id: EntityId) -> StoreResult<bool> {
        self.begin_write()?;
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE uuid = ?1;", kind.table()),
            [id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn fetch_wells(&self, query: &WellQuery) -> StoreResult<Vec<Well>> {
        let mut sql = format!("{WELL_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if !query.ids.is_empty() {
            let placeholders = vec!["?"; query.ids.len()].join(", ");
            sql.push_str(&format!(" AND uuid IN ({placeholders})"));
            bind_values.extend(query.ids.iter().map(|id| Value::Text(id.to_string())));
        }

        sql.push_str(" ORDER BY created_at ASC, uuid ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut wells = Vec::new();
        while let Some(row) = rows.next()? {
            wells.push(parse_well_row(row)?);
        }
        Ok(wells)
    }

    fn fetch_projects(&self, well_uuid: Option<WellId>) -> StoreResult<Vec<ProjectState>> {
        let mut projects = Vec::new();
        if let Some(well_uuid) = well_uuid {
            let mut stmt = self.conn.prepare(&format!(
                "{PROJECT_SELECT_SQL}
                 WHERE well_uuid = ?1
                 ORDER BY created_at ASC, uuid ASC;"
            ))?;
            let mut rows = stmt.query([well_uuid.to_string()])?;
            while let Some(row) = rows.next()? {
                projects.push(parse_project_row(row)?);
            }
        } else {
            let mut stmt = self.conn.prepare(&format!(
                "{PROJECT_SELECT_SQL}
                 ORDER BY created_at ASC, uuid ASC;"
            ))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                projects.push(parse_project_row(row)?);
            }
        }
        Ok(projects)
    }

    fn fetch_project(&self, id: ProjectId) -> StoreResult<Option<ProjectState>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_project_row(row)?));
        }
        Ok(None)
    }

    fn fetch_owned_ids(
        &self,
        kind: EntityKind,
        owner_uuid: EntityId,
    ) -> StoreResult<Vec<EntityId>> {
        let owner_column = kind
            .owner_column()
            .ok_or(StoreError::UnsupportedKind(kind))?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT uuid
             FROM {}
             WHERE {owner_column} = ?1
             ORDER BY created_at ASC, uuid ASC;",
            kind.table()
        ))?;
        let mut rows = stmt.query([owner_uuid.to_string()])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, kind.table())?);
        }
        Ok(ids)
    }

    fn fetch_records(
        &self,
        kind: EntityKind,
        owner_uuid: EntityId,
    ) -> StoreResult<Vec<OwnedRecord>> {
        if !kind.is_record() {
            return Err(StoreError::UnsupportedKind(kind));
        }
        let owner_column = kind
            .owner_column()
            .ok_or(StoreError::UnsupportedKind(kind))?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT
                uuid,
                {owner_column} AS owner_uuid,
                label,
                amount,
                created_at
             FROM {}
             WHERE {owner_column} = ?1
             ORDER BY created_at ASC, uuid ASC;",
            kind.table()
        ))?;
        let mut rows = stmt.query([owner_uuid.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row, kind)?);
        }
        Ok(records)
    }

    fn has_pending_changes(&self) -> bool {
        self.staged && !self.conn.is_autocommit()
    }

    fn commit(&mut self) -> StoreResult<()> {
        if !self.has_pending_changes() {
            self.staged = false;
            return Ok(());
        }

        if let Err(err) = self.conn.execute_batch("COMMIT;") {
            error!(
                "event=store_commit module=store status=error origin={} error={}",
                self.origin.label(),
                err
            );
            if !self.conn.is_autocommit() {
                self.conn.execute_batch("ROLLBACK;")?;
            }
            self.staged = false;
            return Err(err.into());
        }
        self.staged = false;

        let notice = self.feed.publish(self.origin);
        debug!(
            "event=store_commit module=store status=ok origin={} generation={}",
            self.origin.label(),
            notice.generation
        );
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        self.staged = false;
        Ok(())
    }
}

fn parse_well_row(row: &Row<'_>) -> StoreResult<Well> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Well {
        uuid: parse_uuid(&uuid_text, "wells.uuid")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_project_row(row: &Row<'_>) -> StoreResult<ProjectState> {
    let uuid_text: String = row.get("uuid")?;
    let well_text: String = row.get("well_uuid")?;
    Ok(ProjectState {
        uuid: parse_uuid(&uuid_text, "project_states.uuid")?,
        well_uuid: parse_uuid(&well_text, "project_states.well_uuid")?,
        name: row.get("name")?,
        baseline: BaselineParameters {
            bit_depth_m: row.get("bit_depth_m")?,
            hole_diameter_mm: row.get("hole_diameter_mm")?,
            mud_density_kg_m3: row.get("mud_density_kg_m3")?,
            pump_rate_l_min: row.get("pump_rate_l_min")?,
        },
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_record_row(row: &Row<'_>, kind: EntityKind) -> StoreResult<OwnedRecord> {
    let uuid_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_uuid")?;
    Ok(OwnedRecord {
        uuid: parse_uuid(&uuid_text, kind.table())?,
        kind,
        owner_uuid: parse_uuid(&owner_text, kind.table())?,
        label: row.get("label")?,
        amount: row.get("amount")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_uuid(value: &str, column: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| StoreError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

