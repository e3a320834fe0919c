//! Interactive workspace: selection-aware command surface over the store.
//!
//! # Responsibility
//! - Own the interactive store context, the observed roots and the selection.
//! - Guard selection synchronously, then hand deletions to background tasks.
//! - Fold change notices and deletion completions back into selection state.
//!
//! # Invariants
//! - Selection is written only on the thread that owns the workspace.
//! - Only ids cross into background tasks; rows are re-read on each side.
//! - A completion is processed after the change notice of its own commit.
//! - Failed deletions leave selection exactly as the guard set it.

use super::naming::{next_copy_name, normalize_name};
use crate::cascade::{
    DeletionDispatcher, DeletionOutcome, DeletionReport, DeletionTarget, DeletionTicket,
};
use crate::config::WorkspaceConfig;
use crate::model::kind::EntityKind;
use crate::model::well::{
    BaselineParameters, EntityId, OwnedRecord, ProjectId, ProjectState, Well, WellId,
};
use crate::resolve::{load_roots, IdentityResolver, RootCollection, RootEntry};
use crate::selection::{
    apply_fallback, guard_deletion, PendingFallback, Selection, SelectionReconciler,
};
use crate::store::{
    ChangeNotice, ContextOrigin, EntityStore, StoreContainer, StoreError, WellQuery,
};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// Errors from workspace commands.
#[derive(Debug)]
pub enum WorkspaceError {
    /// Name is blank after trim.
    InvalidName,
    /// Target well does not exist or is being deleted.
    WellNotFound(WellId),
    /// Target project does not exist or is being deleted.
    ProjectNotFound(ProjectId),
    /// Owner of a new record does not exist.
    OwnerNotFound(EntityId),
    /// Kind cannot be created through `add_record`.
    UnsupportedKind(EntityKind),
    /// Store-level failure.
    Store(StoreError),
}

impl Display for WorkspaceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "name must not be blank"),
            Self::WellNotFound(id) => write!(f, "well not found: {id}"),
            Self::ProjectNotFound(id) => write!(f, "project not found: {id}"),
            Self::OwnerNotFound(id) => write!(f, "owner not found: {id}"),
            Self::UnsupportedKind(kind) => {
                write!(f, "{} cannot be added as a record", kind.label())
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for WorkspaceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for WorkspaceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound {
                kind: EntityKind::Well,
                id,
            } => Self::WellNotFound(id),
            StoreError::NotFound {
                kind: EntityKind::ProjectState,
                id,
            } => Self::ProjectNotFound(id),
            StoreError::MissingOwner { owner_uuid, .. } => Self::OwnerNotFound(owner_uuid),
            StoreError::UnsupportedKind(kind) => Self::UnsupportedKind(kind),
            other => Self::Store(other),
        }
    }
}

/// Final state of one deletion request as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatus {
    Committed(DeletionReport),
    /// Nothing was persisted; the message is safe to show to the user.
    Failed(String),
}

/// A deletion whose completion has been folded into the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedDeletion {
    pub ticket: DeletionTicket,
    pub target: DeletionTarget,
    pub status: DeletionStatus,
}

impl CompletedDeletion {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, DeletionStatus::Committed(_))
    }
}

/// What one `pump` call processed.
#[derive(Debug, Default)]
pub struct PumpSummary {
    pub notices: usize,
    pub completed: Vec<CompletedDeletion>,
    pub selection_changed: bool,
    /// Default project created for a selected well without projects.
    pub created_default_project: Option<ProjectId>,
}

enum WorkspaceEvent {
    StoreChanged(ChangeNotice),
    DeletionFinished(DeletionOutcome),
}

struct InFlight {
    target: DeletionTarget,
    fallback: PendingFallback,
}

/// Interactive execution context for one consumer.
pub struct Workspace<C: StoreContainer> {
    config: WorkspaceConfig,
    context: C::Context,
    dispatcher: DeletionDispatcher<C>,
    roots: RootCollection,
    reconciler: SelectionReconciler,
    in_flight: BTreeMap<DeletionTicket, InFlight>,
    unclaimed: Vec<CompletedDeletion>,
    events_tx: Sender<WorkspaceEvent>,
    events_rx: Receiver<WorkspaceEvent>,
}

impl<C: StoreContainer> Workspace<C> {
    /// Opens the interactive context, bootstraps an empty store and selects
    /// the first well and project.
    pub fn open(container: Arc<C>, config: WorkspaceConfig) -> WorkspaceResult<Self> {
        let context = container.open_context(ContextOrigin::Interactive)?;
        let (events_tx, events_rx) = mpsc::channel();

        let listener_tx = events_tx.clone();
        container.subscribe(Box::new(move |notice| {
            listener_tx
                .send(WorkspaceEvent::StoreChanged(*notice))
                .is_ok()
        }));

        let mut workspace = Self {
            config,
            context,
            dispatcher: DeletionDispatcher::new(container),
            roots: RootCollection::default(),
            reconciler: SelectionReconciler::new(),
            in_flight: BTreeMap::new(),
            unclaimed: Vec::new(),
            events_tx,
            events_rx,
        };
        workspace.bootstrap_if_empty()?;
        workspace.refresh()?;
        workspace.reconciler.reconcile(&workspace.roots, &HashSet::new());
        info!(
            "event=workspace_open module=workspace status=ok wells={} projects={}",
            workspace.roots.len(),
            workspace.roots.project_count()
        );
        Ok(workspace)
    }

    /// Current `(well, project)` selection.
    pub fn current_selection(&self) -> Selection {
        self.reconciler.selection()
    }

    /// Latest observed root collection.
    pub fn roots(&self) -> &RootCollection {
        &self.roots
    }

    pub fn selected_well(&self) -> Option<&RootEntry> {
        self.current_selection()
            .well_id
            .and_then(|id| self.roots.find_well(id))
    }

    pub fn selected_project(&self) -> Option<&ProjectState> {
        let selection = self.current_selection();
        self.selected_well()
            .zip(selection.project_id)
            .and_then(|(entry, id)| entry.find_project(id))
    }

    /// Number of deletions dispatched but not yet folded back in.
    pub fn pending_deletions(&self) -> usize {
        self.in_flight.len()
    }

    /// Selects a well and its first project.
    pub fn select_well(&mut self, id: WellId) -> WorkspaceResult<()> {
        let pending = self.pending_ids();
        let entry = self
            .roots
            .find_well(id)
            .filter(|_| !pending.contains(&id))
            .ok_or(WorkspaceError::WellNotFound(id))?;
        let project_id = entry
            .first_project_excluding(&pending)
            .map(|project| project.uuid);
        self.reconciler
            .select(Selection::new(Some(id), project_id));
        Ok(())
    }

    /// Selects a project and its owning well.
    pub fn select_project(&mut self, id: ProjectId) -> WorkspaceResult<()> {
        let pending = self.pending_ids();
        let (entry, project) = self
            .roots
            .find_project(id)
            .filter(|(entry, _)| !pending.contains(&id) && !pending.contains(&entry.id()))
            .ok_or(WorkspaceError::ProjectNotFound(id))?;
        self.reconciler
            .select(Selection::new(Some(entry.id()), Some(project.uuid)));
        Ok(())
    }

    /// Creates a well. Selection follows on the next `pump`.
    pub fn create_well(&mut self, name: &str) -> WorkspaceResult<WellId> {
        let name = normalize_name(name).ok_or(WorkspaceError::InvalidName)?;
        let well = Well::new(name);
        self.write(|store| store.insert_well(&well))?;
        debug!("event=well_create module=workspace status=ok");
        Ok(well.uuid)
    }

    /// Creates a project snapshot under `well_id`.
    pub fn create_project(&mut self, well_id: WellId, name: &str) -> WorkspaceResult<ProjectId> {
        let name = normalize_name(name).ok_or(WorkspaceError::InvalidName)?;
        self.reject_pending_well(well_id)?;
        let project = ProjectState::new(well_id, name);
        self.write(|store| store.insert_project(&project))
            .map_err(|err| owner_as_well(err, well_id))?;
        debug!("event=project_create module=workspace status=ok");
        Ok(project.uuid)
    }

    pub fn rename_well(&mut self, id: WellId, name: &str) -> WorkspaceResult<()> {
        let name = normalize_name(name).ok_or(WorkspaceError::InvalidName)?;
        self.reject_pending_well(id)?;
        self.write(|store| store.update_well_name(id, name.as_str()))
    }

    pub fn rename_project(&mut self, id: ProjectId, name: &str) -> WorkspaceResult<()> {
        let name = normalize_name(name).ok_or(WorkspaceError::InvalidName)?;
        let mut project = self.load_project(id)?;
        project.name = name;
        self.write(|store| store.update_project(&project))
    }

    pub fn update_baseline(
        &mut self,
        id: ProjectId,
        baseline: BaselineParameters,
    ) -> WorkspaceResult<()> {
        let mut project = self.load_project(id)?;
        project.baseline = baseline;
        self.write(|store| store.update_project(&project))
    }

    /// Adds one owned row (collection element, transfer, rental or cost line).
    ///
    /// An owner anywhere inside an in-flight deletion counts as missing.
    pub fn add_record(
        &mut self,
        owner: EntityId,
        kind: EntityKind,
        label: &str,
        amount: Option<f64>,
    ) -> WorkspaceResult<EntityId> {
        if !kind.is_record() {
            return Err(WorkspaceError::UnsupportedKind(kind));
        }
        let label = normalize_name(label).ok_or(WorkspaceError::InvalidName)?;
        if self.owner_is_pending(kind, owner)? {
            return Err(WorkspaceError::OwnerNotFound(owner));
        }
        let mut record = OwnedRecord::new(kind, owner, label);
        record.amount = amount;
        self.write(|store| store.insert_record(&record))?;
        Ok(record.uuid)
    }

    /// Copies a project's name and baseline into a new project.
    ///
    /// The copy lands under `target_well` when given, otherwise next to the
    /// source. Owned collections are not copied.
    pub fn duplicate_project(
        &mut self,
        id: ProjectId,
        target_well: Option<WellId>,
    ) -> WorkspaceResult<ProjectId> {
        let source = self.load_project(id)?;
        let well_id = target_well.unwrap_or(source.well_uuid);
        self.reject_pending_well(well_id)?;
        let siblings = self.context.fetch_projects(Some(well_id))?;
        let name = next_copy_name(
            source.name.as_str(),
            siblings.iter().map(|project| project.name.as_str()),
        );

        let mut copy = ProjectState::new(well_id, name);
        copy.baseline = source.baseline;
        self.write(|store| store.insert_project(&copy))
            .map_err(|err| owner_as_well(err, well_id))?;
        debug!(
            "event=project_duplicate module=workspace status=ok reparented={}",
            well_id != source.well_uuid
        );
        Ok(copy.uuid)
    }

    /// Requests deletion of whole wells.
    ///
    /// Returns `None` for an empty request.
    pub fn request_delete_wells(&mut self, ids: &[WellId]) -> Option<DeletionTicket> {
        self.request_delete(DeletionTarget::Wells(ids.to_vec()))
    }

    /// Requests deletion of project snapshots.
    ///
    /// Returns `None` for an empty request.
    pub fn request_delete_projects(&mut self, ids: &[ProjectId]) -> Option<DeletionTicket> {
        self.request_delete(DeletionTarget::Projects(ids.to_vec()))
    }

    /// Processes the events queued at call time without blocking.
    ///
    /// Events caused by this call (for example the commit of an
    /// automatically created default project) are left for the next call.
    pub fn pump(&mut self) -> WorkspaceResult<PumpSummary> {
        let queued: Vec<WorkspaceEvent> = self.events_rx.try_iter().collect();
        let mut summary = PumpSummary {
            completed: std::mem::take(&mut self.unclaimed),
            ..PumpSummary::default()
        };
        for event in queued {
            self.process(event, &mut summary)?;
        }
        summary.created_default_project = self.ensure_default_project()?;
        Ok(summary)
    }

    /// Blocks until `ticket` completes or `timeout` passes.
    ///
    /// Other events met on the way are processed as `pump` would, including
    /// the default project for a selected well left without one. Other
    /// completions are returned by the next `pump`.
    pub fn wait_for(
        &mut self,
        ticket: DeletionTicket,
        timeout: Duration,
    ) -> WorkspaceResult<Option<CompletedDeletion>> {
        if let Some(index) = self.unclaimed.iter().position(|done| done.ticket == ticket) {
            return Ok(Some(self.unclaimed.remove(index)));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match self.events_rx.recv_timeout(remaining) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Ok(None)
                }
            };

            let mut summary = PumpSummary::default();
            self.process(event, &mut summary)?;
            self.ensure_default_project()?;
            for done in summary.completed {
                if done.ticket == ticket {
                    return Ok(Some(done));
                }
                self.unclaimed.push(done);
            }
        }
    }

    fn request_delete(&mut self, target: DeletionTarget) -> Option<DeletionTicket> {
        if target.is_empty() {
            return None;
        }

        let pending = self.pending_ids();
        let fallback = guard_deletion(&mut self.reconciler, &self.roots, &target, &pending);

        let events_tx = self.events_tx.clone();
        let ticket = self.dispatcher.dispatch(target.clone(), move |outcome| {
            if events_tx
                .send(WorkspaceEvent::DeletionFinished(outcome))
                .is_err()
            {
                warn!("event=deletion_complete module=workspace status=skip reason=workspace_closed");
            }
        });
        self.in_flight.insert(ticket, InFlight { target, fallback });
        Some(ticket)
    }

    fn process(&mut self, event: WorkspaceEvent, summary: &mut PumpSummary) -> WorkspaceResult<()> {
        match event {
            WorkspaceEvent::StoreChanged(notice) => {
                summary.notices += 1;
                self.refresh()?;
                let pending = self.pending_ids();
                summary.selection_changed |= self.reconciler.reconcile(&self.roots, &pending);
                debug!(
                    "event=store_changed module=workspace status=ok generation={} origin={}",
                    notice.generation,
                    notice.origin.label()
                );
            }
            WorkspaceEvent::DeletionFinished(outcome) => {
                let done = self.finish(outcome);
                summary.selection_changed |= done.1;
                summary.completed.push(done.0);
            }
        }
        Ok(())
    }

    fn finish(&mut self, outcome: DeletionOutcome) -> (CompletedDeletion, bool) {
        let in_flight = self.in_flight.remove(&outcome.ticket);
        let mut selection_changed = false;

        let status = match outcome.result {
            Ok(report) => {
                if let Some(in_flight) = in_flight.as_ref() {
                    let pending = self.pending_ids();
                    selection_changed = apply_fallback(
                        &mut self.reconciler,
                        &self.roots,
                        &in_flight.fallback,
                        &pending,
                    );
                }
                DeletionStatus::Committed(report)
            }
            Err(err) => {
                warn!(
                    "event=deletion_complete module=workspace status=error ticket={} error={}",
                    outcome.ticket.value(),
                    err
                );
                DeletionStatus::Failed(err.to_string())
            }
        };

        let target = in_flight
            .map(|in_flight| in_flight.target)
            .unwrap_or(outcome.target);
        (
            CompletedDeletion {
                ticket: outcome.ticket,
                target,
                status,
            },
            selection_changed,
        )
    }

    fn ensure_default_project(&mut self) -> WorkspaceResult<Option<ProjectId>> {
        if !self.config.auto_default_project {
            return Ok(None);
        }
        let pending = self.pending_ids();
        let Some(entry) = self.selected_well() else {
            return Ok(None);
        };
        if !entry.projects.is_empty() || pending.contains(&entry.id()) {
            return Ok(None);
        }

        let well_id = entry.id();
        let project = ProjectState::new(well_id, self.config.default_project_name.as_str());
        match self.write(|store| store.insert_project(&project)) {
            Ok(()) => {}
            // Deleted by a concurrent context after the last refresh.
            Err(WorkspaceError::OwnerNotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        }
        info!("event=default_project_create module=workspace status=ok");
        Ok(Some(project.uuid))
    }

    fn bootstrap_if_empty(&mut self) -> WorkspaceResult<()> {
        let first = WellQuery {
            ids: Vec::new(),
            limit: Some(1),
        };
        if !self.context.fetch_wells(&first)?.is_empty() {
            return Ok(());
        }

        let well = Well::new(self.config.bootstrap_well_name.as_str());
        let project = ProjectState::new(well.uuid, self.config.default_project_name.as_str());
        self.write(|store| {
            store.insert_well(&well)?;
            store.insert_project(&project)
        })?;
        info!("event=workspace_bootstrap module=workspace status=ok");
        Ok(())
    }

    /// Loads a project that is neither being deleted nor owned by a well
    /// that is.
    fn load_project(&self, id: ProjectId) -> WorkspaceResult<ProjectState> {
        let pending = self.pending_ids();
        IdentityResolver::new(&self.context)
            .resolve_project(id)?
            .filter(|project| !pending.contains(&id) && !pending.contains(&project.well_uuid))
            .ok_or(WorkspaceError::ProjectNotFound(id))
    }

    fn reject_pending_well(&self, id: WellId) -> WorkspaceResult<()> {
        if self.pending_ids().contains(&id) {
            return Err(WorkspaceError::WellNotFound(id));
        }
        Ok(())
    }

    /// Whether `owner` of a new `kind` row falls inside an in-flight deletion.
    fn owner_is_pending(&self, kind: EntityKind, owner: EntityId) -> WorkspaceResult<bool> {
        let pending = self.pending_ids();
        if pending.contains(&owner) {
            return Ok(true);
        }
        match kind.owner_kind() {
            Some(EntityKind::ProjectState) => Ok(self
                .context
                .fetch_project(owner)?
                .is_some_and(|project| pending.contains(&project.well_uuid))),
            Some(parent @ (EntityKind::Transfer | EntityKind::Rental)) => {
                for well_id in self.pending_well_ids() {
                    if self.context.fetch_owned_ids(parent, well_id)?.contains(&owner) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    fn refresh(&mut self) -> WorkspaceResult<()> {
        self.roots = load_roots(&self.context)?;
        Ok(())
    }

    /// Runs `op` on the interactive context and commits; rolls back on error.
    fn write<T>(
        &mut self,
        op: impl FnOnce(&mut C::Context) -> Result<T, StoreError>,
    ) -> WorkspaceResult<T> {
        let result = op(&mut self.context).and_then(|value| {
            self.context.commit()?;
            Ok(value)
        });
        if result.is_err() {
            if let Err(rollback_err) = self.context.rollback() {
                warn!(
                    "event=workspace_rollback module=workspace status=error error={}",
                    rollback_err
                );
            }
        }
        result.map_err(WorkspaceError::from)
    }

    fn pending_ids(&self) -> HashSet<EntityId> {
        self.in_flight
            .values()
            .flat_map(|in_flight| in_flight.target.ids().iter().copied())
            .collect()
    }

    fn pending_well_ids(&self) -> impl Iterator<Item = WellId> + '_ {
        self.in_flight
            .values()
            .filter_map(|in_flight| match &in_flight.target {
                DeletionTarget::Wells(ids) => Some(ids.iter().copied()),
                DeletionTarget::Projects(_) => None,
            })
            .flatten()
    }
}

fn owner_as_well(err: WorkspaceError, well_id: WellId) -> WorkspaceError {
    match err {
        WorkspaceError::OwnerNotFound(_) => WorkspaceError::WellNotFound(well_id),
        other => other,
    }
}

impl<C: StoreContainer> Drop for Workspace<C> {
    fn drop(&mut self) {
        if !self.in_flight.is_empty() {
            debug!(
                "event=workspace_close module=workspace status=ok in_flight={}",
                self.in_flight.len()
            );
        }
    }
}
