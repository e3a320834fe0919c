//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wellplan_core::model::well::EntityId;
use wellplan_core::store::{ChangeListener, WellQuery};
use wellplan_core::{
    ContextOrigin, EntityKind, EntityStore, OwnedRecord, ProjectId, ProjectState,
    SqliteContainer, SqliteContext, StoreContainer, StoreError, StoreResult, Well, WellId,
};

pub const ROWS_PER_COLLECTION: usize = 3;

pub fn temp_container() -> (tempfile::TempDir, SqliteContainer) {
    let dir = tempfile::tempdir().unwrap();
    let container = SqliteContainer::open(dir.path().join("wellplan.sqlite3")).unwrap();
    (dir, container)
}

/// Ids written by [`seed_well`].
pub struct SeededWell {
    pub well_id: WellId,
    pub project_ids: Vec<ProjectId>,
    pub entity_count: usize,
}

/// Writes a well with `projects` fully populated projects plus transfers,
/// rentals and their cost lines, then commits.
pub fn seed_well<S: EntityStore>(store: &mut S, name: &str, projects: usize) -> SeededWell {
    let well = Well::new(name);
    store.insert_well(&well).unwrap();
    let mut entity_count = 1;

    let mut project_ids = Vec::new();
    for index in 0..projects {
        let project = ProjectState::new(well.uuid, format!("Project {index}"));
        store.insert_project(&project).unwrap();
        entity_count += 1;
        for kind in EntityKind::SNAPSHOT_COLLECTIONS {
            entity_count += insert_rows(store, kind, project.uuid, ROWS_PER_COLLECTION);
        }
        project_ids.push(project.uuid);
    }

    for (parent, child) in [
        (EntityKind::Transfer, EntityKind::TransferItem),
        (EntityKind::Rental, EntityKind::RentalCharge),
    ] {
        for index in 0..2 {
            let record = OwnedRecord::new(parent, well.uuid, format!("{} {index}", parent.label()))
                .with_amount(100.0);
            store.insert_record(&record).unwrap();
            entity_count += 1;
            entity_count += insert_rows(store, child, record.uuid, 2);
        }
    }

    store.commit().unwrap();
    SeededWell {
        well_id: well.uuid,
        project_ids,
        entity_count,
    }
}

fn insert_rows<S: EntityStore>(
    store: &mut S,
    kind: EntityKind,
    owner: EntityId,
    count: usize,
) -> usize {
    for index in 0..count {
        let record = OwnedRecord::new(kind, owner, format!("{} {index}", kind.label()))
            .with_amount(index as f64);
        store.insert_record(&record).unwrap();
    }
    count
}

/// Total rows across every table, read through a fresh context.
pub fn total_rows(container: &SqliteContainer) -> usize {
    let context = container.open_context(ContextOrigin::Interactive).unwrap();
    let tables = [
        EntityKind::Well,
        EntityKind::ProjectState,
        EntityKind::SurveyPoint,
        EntityKind::DrillStringSection,
        EntityKind::AnnulusSection,
        EntityKind::MudStep,
        EntityKind::FinalLayer,
        EntityKind::MudRecord,
        EntityKind::ProgramStage,
        EntityKind::Transfer,
        EntityKind::TransferItem,
        EntityKind::Rental,
        EntityKind::RentalCharge,
    ];
    tables
        .into_iter()
        .map(|kind| {
            let count: i64 = context
                .conn()
                .query_row(&format!("SELECT COUNT(*) FROM {};", kind.table()), [], |row| {
                    row.get(0)
                })
                .unwrap();
            count as usize
        })
        .sum()
}

pub fn well_ids(container: &SqliteContainer) -> Vec<WellId> {
    let context = container.open_context(ContextOrigin::Interactive).unwrap();
    context
        .fetch_wells(&WellQuery::all())
        .unwrap()
        .into_iter()
        .map(|well| well.uuid)
        .collect()
}

/// Container whose background contexts fail to commit while armed.
pub struct FailingCommitContainer {
    pub inner: SqliteContainer,
    pub armed: Arc<AtomicBool>,
}

impl FailingCommitContainer {
    pub fn new(inner: SqliteContainer) -> Self {
        Self {
            inner,
            armed: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl StoreContainer for FailingCommitContainer {
    type Context = FailingCommitContext;

    fn open_context(&self, origin: ContextOrigin) -> StoreResult<FailingCommitContext> {
        Ok(FailingCommitContext {
            inner: self.inner.open_context(origin)?,
            fail: origin == ContextOrigin::Background && self.armed.load(Ordering::SeqCst),
        })
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.inner.subscribe(listener);
    }
}

pub struct FailingCommitContext {
    inner: SqliteContext,
    fail: bool,
}

impl EntityStore for FailingCommitContext {
    fn begin(&mut self) -> StoreResult<()> {
        self.inner.begin()
    }

    fn insert_well(&mut self, well: &Well) -> StoreResult<()> {
        self.inner.insert_well(well)
    }

    fn insert_project(&mut self, project: &ProjectState) -> StoreResult<()> {
        self.inner.insert_project(project)
    }

    fn insert_record(&mut self, record: &OwnedRecord) -> StoreResult<()> {
        self.inner.insert_record(record)
    }

    fn update_well_name(&mut self, id: WellId, name: &str) -> StoreResult<()> {
        self.inner.update_well_name(id, name)
    }

    fn update_project(&mut self, project: &ProjectState) -> StoreResult<()> {
        self.inner.update_project(project)
    }

    fn delete_by_identity(&mut self, kind: EntityKind, id: EntityId) -> StoreResult<bool> {
        self.inner.delete_by_identity(kind, id)
    }

    fn fetch_wells(&self, query: &WellQuery) -> StoreResult<Vec<Well>> {
        self.inner.fetch_wells(query)
    }

    fn fetch_projects(&self, well_uuid: Option<WellId>) -> StoreResult<Vec<ProjectState>> {
        self.inner.fetch_projects(well_uuid)
    }

    fn fetch_project(&self, id: ProjectId) -> StoreResult<Option<ProjectState>> {
        self.inner.fetch_project(id)
    }

    fn fetch_owned_ids(&self, kind: EntityKind, owner_uuid: EntityId) -> StoreResult<Vec<EntityId>> {
        self.inner.fetch_owned_ids(kind, owner_uuid)
    }

    fn fetch_records(&self, kind: EntityKind, owner_uuid: EntityId) -> StoreResult<Vec<OwnedRecord>> {
        self.inner.fetch_records(kind, owner_uuid)
    }

    fn has_pending_changes(&self) -> bool {
        self.inner.has_pending_changes()
    }

    fn commit(&mut self) -> StoreResult<()> {
        if self.fail && self.inner.has_pending_changes() {
            self.inner.rollback()?;
            return Err(StoreError::InvalidData("injected commit failure".to_string()));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> StoreResult<()> {
        self.inner.rollback()
    }
}
