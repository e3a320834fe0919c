//! Entity store contracts.
//!
//! # Responsibility
//! - Define the per-context store API used by every other layer.
//! - Define the container that hands out isolated contexts over one database.
//! - Publish a change notice after every commit that carried changes.
//!
//! # Invariants
//! - A context only ever returns rows it read through its own connection.
//! - Writes are invisible to other contexts until `commit()` succeeds.
//! - No API deletes an owner together with its owned rows.

use crate::db::DbError;
use crate::model::kind::EntityKind;
use crate::model::well::{EntityId, OwnedRecord, ProjectId, ProjectState, Well, WellId};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod feed;
mod sqlite;

pub use feed::{ChangeFeed, ChangeListener, ChangeNotice};
pub use sqlite::{SqliteContainer, SqliteContext};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from entity store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist in this context.
    NotFound { kind: EntityKind, id: EntityId },
    /// Owner referenced by a new row does not exist in this context.
    MissingOwner { kind: EntityKind, owner_uuid: EntityId },
    /// Record kind cannot be stored through this API.
    UnsupportedKind(EntityKind),
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{} not found: {id}", kind.label()),
            Self::MissingOwner { kind, owner_uuid } => write!(
                f,
                "owner {owner_uuid} of new {} does not exist",
                kind.label()
            ),
            Self::UnsupportedKind(kind) => {
                write!(f, "{} cannot be stored as an owned record", kind.label())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Which side of the context boundary a store context serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextOrigin {
    /// The single context that owns selection state and UI commands.
    Interactive,
    /// A short-lived context owned by one background task.
    Background,
}

impl ContextOrigin {
    pub fn label(self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Background => "background",
        }
    }
}

/// Fetch predicate for root aggregates.
#[derive(Debug, Clone, Default)]
pub struct WellQuery {
    /// Restrict to these ids. Empty means all wells.
    pub ids: Vec<WellId>,
    pub limit: Option<u32>,
}

impl WellQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_ids(ids: impl IntoIterator<Item = WellId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            limit: None,
        }
    }
}

/// One store context: an independent handle onto the shared container.
///
/// Every fetch result is ordered by creation `(created_at, uuid)` ascending.
pub trait EntityStore {
    /// Takes the write lock now, so later reads see no foreign commits until
    /// `commit` or `rollback`. Writes take it implicitly.
    fn begin(&mut self) -> StoreResult<()>;
    /// Stages one new well.
    fn insert_well(&mut self, well: &Well) -> StoreResult<()>;
    /// Stages one new project snapshot. Its well must exist in this context.
    fn insert_project(&mut self, project: &ProjectState) -> StoreResult<()>;
    /// Stages one owned record. Its owner must exist in this context.
    fn insert_record(&mut self, record: &OwnedRecord) -> StoreResult<()>;
    /// Renames one well.
    fn update_well_name(&mut self, id: WellId, name: &str) -> StoreResult<()>;
    /// Rewrites name, baseline and owning well of one project snapshot.
    fn update_project(&mut self, project: &ProjectState) -> StoreResult<()>;
    /// Deletes exactly one row. Returns `false` when the row was already gone.
    fn delete_by_identity(&mut self, kind: EntityKind, id: EntityId) -> StoreResult<bool>;
    /// Fetches wells matching `query`.
    fn fetch_wells(&self, query: &WellQuery) -> StoreResult<Vec<Well>>;
    /// Fetches project snapshots, optionally restricted to one well.
    fn fetch_projects(&self, well_uuid: Option<WellId>) -> StoreResult<Vec<ProjectState>>;
    /// Fetches one project snapshot by id.
    fn fetch_project(&self, id: ProjectId) -> StoreResult<Option<ProjectState>>;
    /// Fetches ids of rows of `kind` owned by `owner_uuid`.
    fn fetch_owned_ids(&self, kind: EntityKind, owner_uuid: EntityId)
        -> StoreResult<Vec<EntityId>>;
    /// Fetches owned records of `kind` under `owner_uuid`.
    fn fetch_records(&self, kind: EntityKind, owner_uuid: EntityId)
        -> StoreResult<Vec<OwnedRecord>>;
    /// Whether staged, uncommitted writes exist.
    fn has_pending_changes(&self) -> bool;
    /// Atomically persists staged writes and publishes a change notice.
    fn commit(&mut self) -> StoreResult<()>;
    /// Discards staged writes.
    fn rollback(&mut self) -> StoreResult<()>;
}

/// Shared persistent container that hands out isolated contexts.
pub trait StoreContainer: Send + Sync + 'static {
    type Context: EntityStore;

    /// Opens a new context bound to this container.
    fn open_context(&self, origin: ContextOrigin) -> StoreResult<Self::Context>;
    /// Registers a listener called after every committed change.
    fn subscribe(&self, listener: ChangeListener);
}
