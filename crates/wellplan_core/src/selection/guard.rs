//! Synchronous pre-deletion guard and deferred fallback.

use super::reconciler::{Selection, SelectionReconciler};
use crate::cascade::DeletionTarget;
use crate::model::well::{EntityId, ProjectId, WellId};
use crate::resolve::RootCollection;
use log::debug;
use std::collections::HashSet;

/// Selection captured by the guard, applied once the deletion committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFallback {
    /// Fallback well, or the unchanged owner well when only the project was cleared.
    pub well_id: Option<WellId>,
    pub project_id: Option<ProjectId>,
    /// The guard nulled the well slot (and with it the project slot).
    pub cleared_well: bool,
    /// The guard nulled the project slot.
    pub cleared_project: bool,
}

impl PendingFallback {
    /// Whether the guard left the selection untouched.
    pub fn is_noop(&self) -> bool {
        !self.cleared_well && !self.cleared_project
    }
}

/// Nulls any selection `target` is about to destroy and captures a fallback.
///
/// Must run on the interactive context before the deletion is dispatched.
/// `pending` holds ids of deletions already in flight; fallbacks never point
/// at them either.
pub fn guard_deletion(
    reconciler: &mut SelectionReconciler,
    roots: &RootCollection,
    target: &DeletionTarget,
    pending: &HashSet<EntityId>,
) -> PendingFallback {
    let selection = reconciler.selection();
    let mut excluded: HashSet<EntityId> = target.ids().iter().copied().collect();
    excluded.extend(pending.iter().copied());

    let fallback = match target {
        DeletionTarget::Wells(_) => {
            let owner_of_project = selection.project_id.and_then(|id| roots.owner_of(id));
            let hit = selection
                .well_id
                .into_iter()
                .chain(owner_of_project)
                .any(|id| target.ids().contains(&id));
            if !hit {
                return PendingFallback::default();
            }

            reconciler.clear();
            let next = roots.first_well_excluding(&excluded);
            PendingFallback {
                well_id: next.map(|entry| entry.id()),
                project_id: next
                    .and_then(|entry| entry.first_project_excluding(&excluded))
                    .map(|project| project.uuid),
                cleared_well: true,
                cleared_project: true,
            }
        }
        DeletionTarget::Projects(ids) => {
            let Some(project_id) = selection.project_id.filter(|id| ids.contains(id)) else {
                return PendingFallback::default();
            };

            reconciler.clear_project();
            let owner = selection
                .well_id
                .and_then(|id| roots.find_well(id))
                .or_else(|| roots.find_project(project_id).map(|(entry, _)| entry));
            PendingFallback {
                well_id: selection.well_id,
                project_id: owner
                    .and_then(|entry| entry.first_project_excluding(&excluded))
                    .map(|project| project.uuid),
                cleared_well: false,
                cleared_project: true,
            }
        }
    };

    debug!(
        "event=selection_guard module=selection status=ok kind={} cleared_well={} has_fallback={}",
        target.kind().label(),
        fallback.cleared_well,
        fallback.project_id.is_some() || (fallback.cleared_well && fallback.well_id.is_some())
    );
    fallback
}

/// Applies a captured fallback after its deletion committed.
///
/// The fallback is re-resolved against the fresh `roots`; a slot somebody
/// re-filled since the guard ran is left alone. Whatever cannot be resolved
/// is settled by the normal reconciliation rule. Returns whether the
/// selection changed.
pub fn apply_fallback(
    reconciler: &mut SelectionReconciler,
    roots: &RootCollection,
    fallback: &PendingFallback,
    pending: &HashSet<EntityId>,
) -> bool {
    let before = reconciler.selection();
    let live_well = |id: WellId| {
        roots
            .find_well(id)
            .filter(|entry| !pending.contains(&entry.id()))
    };

    if fallback.cleared_well && before.well_id.is_none() {
        if let Some(entry) = fallback.well_id.and_then(live_well) {
            let project_id = fallback
                .project_id
                .and_then(|id| entry.find_project(id))
                .filter(|project| !pending.contains(&project.uuid))
                .map(|project| project.uuid);
            reconciler.select(Selection::new(Some(entry.id()), project_id));
        }
    } else if fallback.cleared_project && before.project_id.is_none() {
        let resolved = before
            .well_id
            .filter(|id| Some(*id) == fallback.well_id)
            .and_then(live_well)
            .and_then(|entry| fallback.project_id.and_then(|id| entry.find_project(id)))
            .filter(|project| !pending.contains(&project.uuid));
        if let Some(project) = resolved {
            reconciler.select(Selection::new(before.well_id, Some(project.uuid)));
        }
    }

    reconciler.reconcile(roots, pending);
    before != reconciler.selection()
}

#[cfg(test)]
mod tests {
    use super::{apply_fallback, guard_deletion};
    use crate::cascade::DeletionTarget;
    use crate::model::well::{ProjectState, Well};
    use crate::resolve::RootCollection;
    use crate::selection::{Selection, SelectionReconciler};
    use std::collections::HashSet;
    use uuid::Uuid;

    struct Fixture {
        roots: RootCollection,
        wells: Vec<Well>,
        projects: Vec<ProjectState>,
    }

    /// Two wells; the first owns three projects, the second one.
    fn fixture() -> Fixture {
        let wells: Vec<Well> = (1..=2)
            .map(|created_at| Well {
                uuid: Uuid::new_v4(),
                name: format!("W{created_at}"),
                created_at,
                updated_at: created_at,
            })
            .collect();
        let mut projects = Vec::new();
        for (index, owner) in [0usize, 0, 0, 1].into_iter().enumerate() {
            let mut project = ProjectState::new(wells[owner].uuid, format!("P{index}"));
            project.created_at = index as i64;
            projects.push(project);
        }
        Fixture {
            roots: RootCollection::from_parts(wells.clone(), projects.clone()),
            wells,
            projects,
        }
    }

    #[test]
    fn deleting_selected_project_nulls_it_and_captures_first_surviving_sibling() {
        let f = fixture();
        let mut reconciler = SelectionReconciler::with_selection(Selection::new(
            Some(f.wells[0].uuid),
            Some(f.projects[0].uuid),
        ));

        let target = DeletionTarget::Projects(vec![f.projects[0].uuid, f.projects[1].uuid]);
        let fallback = guard_deletion(&mut reconciler, &f.roots, &target, &HashSet::new());

        assert_eq!(reconciler.selection().project_id, None);
        assert_eq!(reconciler.selection().well_id, Some(f.wells[0].uuid));
        assert!(fallback.cleared_project && !fallback.cleared_well);
        assert_eq!(fallback.project_id, Some(f.projects[2].uuid));
    }

    #[test]
    fn unrelated_deletion_leaves_selection_alone() {
        let f = fixture();
        let selected = Selection::new(Some(f.wells[0].uuid), Some(f.projects[2].uuid));
        let mut reconciler = SelectionReconciler::with_selection(selected);

        let target = DeletionTarget::Projects(vec![f.projects[0].uuid]);
        let fallback = guard_deletion(&mut reconciler, &f.roots, &target, &HashSet::new());
        assert!(fallback.is_noop());
        assert_eq!(reconciler.selection(), selected);

        let target = DeletionTarget::Wells(vec![f.wells[1].uuid]);
        assert!(guard_deletion(&mut reconciler, &f.roots, &target, &HashSet::new()).is_noop());
        assert_eq!(reconciler.selection(), selected);
    }

    #[test]
    fn deleting_selected_well_nulls_both_slots() {
        let f = fixture();
        let mut reconciler = SelectionReconciler::with_selection(Selection::new(
            Some(f.wells[0].uuid),
            Some(f.projects[1].uuid),
        ));

        let target = DeletionTarget::Wells(vec![f.wells[0].uuid]);
        let fallback = guard_deletion(&mut reconciler, &f.roots, &target, &HashSet::new());

        assert!(reconciler.selection().is_empty());
        assert_eq!(fallback.well_id, Some(f.wells[1].uuid));
        assert_eq!(fallback.project_id, Some(f.projects[3].uuid));
    }

    #[test]
    fn fallback_is_applied_after_commit() {
        let f = fixture();
        let mut reconciler = SelectionReconciler::with_selection(Selection::new(
            Some(f.wells[0].uuid),
            Some(f.projects[0].uuid),
        ));
        let target = DeletionTarget::Projects(vec![f.projects[0].uuid]);
        let fallback = guard_deletion(&mut reconciler, &f.roots, &target, &HashSet::new());

        let fresh = RootCollection::from_parts(f.wells.clone(), f.projects[1..].to_vec());
        apply_fallback(&mut reconciler, &fresh, &fallback, &HashSet::new());
        assert_eq!(
            reconciler.selection(),
            Selection::new(Some(f.wells[0].uuid), Some(f.projects[1].uuid))
        );
    }

    #[test]
    fn invalidated_fallback_defers_to_reconciliation() {
        let f = fixture();
        let mut reconciler = SelectionReconciler::with_selection(Selection::new(
            Some(f.wells[0].uuid),
            Some(f.projects[0].uuid),
        ));
        let target = DeletionTarget::Wells(vec![f.wells[0].uuid]);
        let fallback = guard_deletion(&mut reconciler, &f.roots, &target, &HashSet::new());
        assert_eq!(fallback.well_id, Some(f.wells[1].uuid));

        // A second deletion removed the fallback well before this one finished.
        let fresh = RootCollection::default();
        apply_fallback(&mut reconciler, &fresh, &fallback, &HashSet::new());
        assert!(reconciler.selection().is_empty());
    }

    #[test]
    fn refilled_slot_is_not_overwritten() {
        let f = fixture();
        let mut reconciler = SelectionReconciler::with_selection(Selection::new(
            Some(f.wells[0].uuid),
            Some(f.projects[0].uuid),
        ));
        let target = DeletionTarget::Projects(vec![f.projects[0].uuid]);
        let fallback = guard_deletion(&mut reconciler, &f.roots, &target, &HashSet::new());

        let user_choice = Selection::new(Some(f.wells[1].uuid), Some(f.projects[3].uuid));
        reconciler.select(user_choice);

        let fresh = RootCollection::from_parts(f.wells.clone(), f.projects[1..].to_vec());
        assert!(!apply_fallback(&mut reconciler, &fresh, &fallback, &HashSet::new()));
        assert_eq!(reconciler.selection(), user_choice);
    }
}
