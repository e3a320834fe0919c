//! Plan execution inside one isolated context.

use super::planner::{plan_project, plan_well, DeletionPlan};
use crate::model::kind::EntityKind;
use crate::model::well::{EntityId, ProjectId, WellId};
use crate::resolve::IdentityResolver;
use crate::store::{EntityStore, StoreError};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// What a deletion request destroys, by id only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    Wells(Vec<WellId>),
    Projects(Vec<ProjectId>),
}

impl DeletionTarget {
    pub fn ids(&self) -> &[EntityId] {
        match self {
            Self::Wells(ids) | Self::Projects(ids) => ids,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Wells(_) => EntityKind::Well,
            Self::Projects(_) => EntityKind::ProjectState,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

/// Summary of one committed deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Distinct ids in the request.
    pub requested: usize,
    /// Ids that still resolved in the executing context.
    pub resolved: usize,
    /// Ids already gone; absorbed as no-ops.
    pub skipped: usize,
    /// Rows actually removed.
    pub deleted: usize,
    pub batches: usize,
}

/// Failures surfaced to the initiator of a deletion.
#[derive(Debug)]
pub enum DeletionError {
    /// Resolution or a delete statement failed; nothing was committed.
    Store(StoreError),
    /// The final commit failed; nothing was committed.
    CommitFailed(StoreError),
    /// The background task panicked; nothing was committed.
    Panicked(String),
    /// No thread could be started for the task; nothing was attempted.
    SpawnFailed(String),
}

impl Display for DeletionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "deletion failed: {err}"),
            Self::CommitFailed(err) => write!(f, "deletion commit failed: {err}"),
            Self::Panicked(message) => write!(f, "deletion task panicked: {message}"),
            Self::SpawnFailed(message) => write!(f, "deletion task could not start: {message}"),
        }
    }
}

impl Error for DeletionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) | Self::CommitFailed(err) => Some(err),
            Self::Panicked(_) | Self::SpawnFailed(_) => None,
        }
    }
}

impl From<StoreError> for DeletionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Resolves `target` inside `store`, runs the tiered plan and commits once.
///
/// The write lock is taken before anything is resolved, so the graph that is
/// planned is the graph that is deleted: no other context can add an owned
/// row in between. Ids that no longer resolve are skipped. On any error the
/// context is rolled back before returning, so no partial deletion is ever
/// committed.
pub fn execute<S: EntityStore>(
    store: &mut S,
    target: &DeletionTarget,
) -> Result<DeletionReport, DeletionError> {
    let started_at = Instant::now();
    let kind = target.kind().label();

    if let Err(err) = store.begin() {
        error!(
            "event=deletion_begin module=cascade status=error kind={} error={}",
            kind, err
        );
        discard(store);
        return Err(err.into());
    }

    let (plan, mut report) = match build_plan(store, target) {
        Ok(result) => result,
        Err(err) => {
            error!(
                "event=deletion_plan module=cascade status=error kind={} error={}",
                kind, err
            );
            discard(store);
            return Err(err.into());
        }
    };

    if plan.is_empty() {
        discard(store);
        info!(
            "event=deletion_execute module=cascade status=skip kind={} requested={} reason=nothing_resolved",
            kind, report.requested
        );
        return Ok(report);
    }

    for batch in plan.batches() {
        for id in &batch.ids {
            match store.delete_by_identity(batch.kind, *id) {
                Ok(true) => report.deleted += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(
                        "event=deletion_execute module=cascade status=error kind={} batch_kind={} error={}",
                        kind,
                        batch.kind.label(),
                        err
                    );
                    discard(store);
                    return Err(DeletionError::Store(err));
                }
            }
        }
        report.batches += 1;
    }

    if let Err(err) = store.commit() {
        error!(
            "event=deletion_commit module=cascade status=error kind={} duration_ms={} error={}",
            kind,
            started_at.elapsed().as_millis(),
            err
        );
        discard(store);
        return Err(DeletionError::CommitFailed(err));
    }

    info!(
        "event=deletion_commit module=cascade status=ok kind={} requested={} resolved={} skipped={} deleted={} batches={} duration_ms={}",
        kind,
        report.requested,
        report.resolved,
        report.skipped,
        report.deleted,
        report.batches,
        started_at.elapsed().as_millis()
    );
    Ok(report)
}

fn build_plan<S: EntityStore>(
    store: &S,
    target: &DeletionTarget,
) -> Result<(DeletionPlan, DeletionReport), StoreError> {
    let resolver = IdentityResolver::new(store);
    let mut seen = HashSet::new();
    let mut plan = DeletionPlan::default();
    let mut report = DeletionReport::default();

    for id in target.ids() {
        if !seen.insert(*id) {
            continue;
        }
        report.requested += 1;

        let planned = match target {
            DeletionTarget::Wells(_) => resolver.load_well_graph(*id)?.map(|graph| plan_well(&graph)),
            DeletionTarget::Projects(_) => resolver
                .load_project_graph(*id)?
                .map(|graph| plan_project(&graph)),
        };
        match planned {
            Some(step) => {
                report.resolved += 1;
                plan.extend(step);
            }
            None => report.skipped += 1,
        }
    }

    Ok((plan, report))
}

fn discard<S: EntityStore>(store: &mut S) {
    if let Err(err) = store.rollback() {
        warn!(
            "event=deletion_rollback module=cascade status=error error={}",
            err
        );
    }
}
