//! Selection state machine.

use crate::model::well::{EntityId, ProjectId, WellId};
use crate::resolve::{RootCollection, RootEntry};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Currently selected well and project, by id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub well_id: Option<WellId>,
    pub project_id: Option<ProjectId>,
}

impl Selection {
    pub fn new(well_id: Option<WellId>, project_id: Option<ProjectId>) -> Self {
        Self {
            well_id,
            project_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.well_id.is_none() && self.project_id.is_none()
    }

    fn first_of(roots: &RootCollection, excluded: &HashSet<EntityId>) -> Self {
        match roots.first_well_excluding(excluded) {
            Some(entry) => Self::first_in(entry, excluded),
            None => Self::default(),
        }
    }

    fn first_in(entry: &RootEntry, excluded: &HashSet<EntityId>) -> Self {
        Self {
            well_id: Some(entry.id()),
            project_id: entry
                .first_project_excluding(excluded)
                .map(|project| project.uuid),
        }
    }
}

/// Single authority over selection state.
///
/// Selection only changes through `reconcile`, an explicit `select`, a guard
/// clear, or a fallback applied after a deletion completed.
#[derive(Debug, Clone, Default)]
pub struct SelectionReconciler {
    selection: Selection,
}

impl SelectionReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_selection(selection: Selection) -> Self {
        Self { selection }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Replaces the selection without validation. Callers resolve first.
    pub fn select(&mut self, selection: Selection) {
        self.selection = selection;
    }

    pub fn clear_project(&mut self) {
        self.selection.project_id = None;
    }

    pub fn clear(&mut self) {
        self.selection = Selection::default();
    }

    /// Revalidates the selection against a fresh root collection.
    ///
    /// Ids in `pending` are treated as already deleted. Returns whether the
    /// selection changed.
    pub fn reconcile(&mut self, roots: &RootCollection, pending: &HashSet<EntityId>) -> bool {
        let before = self.selection;
        let selected_root = self
            .selection
            .well_id
            .and_then(|id| roots.find_well(id))
            .filter(|entry| !pending.contains(&entry.id()));

        self.selection = match selected_root {
            Some(entry) => {
                let kept = self
                    .selection
                    .project_id
                    .and_then(|id| entry.find_project(id))
                    .filter(|project| !pending.contains(&project.uuid));
                match kept {
                    Some(project) => Selection::new(Some(entry.id()), Some(project.uuid)),
                    None => Selection::first_in(entry, pending),
                }
            }
            None => Selection::first_of(roots, pending),
        };

        let changed = before != self.selection;
        if changed {
            debug!(
                "event=selection_reconcile module=selection status=ok changed=true roots={} well_selected={} project_selected={}",
                roots.len(),
                self.selection.well_id.is_some(),
                self.selection.project_id.is_some()
            );
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, SelectionReconciler};
    use crate::model::well::{ProjectState, Well};
    use crate::resolve::RootCollection;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn well(created_at: i64) -> Well {
        Well {
            uuid: Uuid::new_v4(),
            name: format!("well-{created_at}"),
            created_at,
            updated_at: created_at,
        }
    }

    fn project(well: &Well, created_at: i64) -> ProjectState {
        let mut project = ProjectState::new(well.uuid, format!("p-{created_at}"));
        project.created_at = created_at;
        project
    }

    #[test]
    fn empty_selection_picks_first_root_and_child() {
        let (w1, w2) = (well(1), well(2));
        let p1 = project(&w1, 10);
        let p0 = project(&w1, 5);
        let roots = RootCollection::from_parts(vec![w2, w1.clone()], vec![p1, p0.clone()]);

        let mut reconciler = SelectionReconciler::new();
        assert!(reconciler.reconcile(&roots, &HashSet::new()));
        assert_eq!(
            reconciler.selection(),
            Selection::new(Some(w1.uuid), Some(p0.uuid))
        );
    }

    #[test]
    fn empty_collection_yields_null_selection() {
        let mut reconciler =
            SelectionReconciler::with_selection(Selection::new(Some(Uuid::new_v4()), None));
        reconciler.reconcile(&RootCollection::default(), &HashSet::new());
        assert!(reconciler.selection().is_empty());
    }

    #[test]
    fn missing_child_falls_back_to_first_child_of_same_root() {
        let w = well(1);
        let (a, b) = (project(&w, 1), project(&w, 2));
        let roots = RootCollection::from_parts(vec![w.clone()], vec![a.clone(), b.clone()]);

        let mut reconciler =
            SelectionReconciler::with_selection(Selection::new(Some(w.uuid), Some(b.uuid)));
        assert!(!reconciler.reconcile(&roots, &HashSet::new()));

        let roots = RootCollection::from_parts(vec![w.clone()], vec![a.clone()]);
        reconciler.reconcile(&roots, &HashSet::new());
        assert_eq!(reconciler.selection(), Selection::new(Some(w.uuid), Some(a.uuid)));
    }

    #[test]
    fn deleted_root_falls_back_to_next_root_by_creation_time() {
        let (t1, t2, t3) = (well(100), well(200), well(300));
        let p2 = project(&t2, 1);
        let mut reconciler =
            SelectionReconciler::with_selection(Selection::new(Some(t1.uuid), None));

        let roots = RootCollection::from_parts(vec![t3, t2.clone()], vec![p2.clone()]);
        reconciler.reconcile(&roots, &HashSet::new());
        assert_eq!(reconciler.selection(), Selection::new(Some(t2.uuid), Some(p2.uuid)));
    }

    #[test]
    fn pending_ids_are_never_selected() {
        let (w1, w2) = (well(1), well(2));
        let (a, b) = (project(&w1, 1), project(&w1, 2));
        let roots = RootCollection::from_parts(vec![w1.clone(), w2.clone()], vec![a.clone(), b.clone()]);

        let mut reconciler = SelectionReconciler::new();
        let pending: HashSet<_> = [a.uuid].into_iter().collect();
        reconciler.reconcile(&roots, &pending);
        assert_eq!(reconciler.selection(), Selection::new(Some(w1.uuid), Some(b.uuid)));

        let pending: HashSet<_> = [w1.uuid].into_iter().collect();
        reconciler.reconcile(&roots, &pending);
        assert_eq!(reconciler.selection(), Selection::new(Some(w2.uuid), None));
    }

    #[test]
    fn child_of_another_root_is_replaced() {
        let (w1, w2) = (well(1), well(2));
        let (a, foreign) = (project(&w1, 1), project(&w2, 1));
        let roots = RootCollection::from_parts(vec![w1.clone(), w2], vec![a.clone(), foreign.clone()]);

        let mut reconciler =
            SelectionReconciler::with_selection(Selection::new(Some(w1.uuid), Some(foreign.uuid)));
        reconciler.reconcile(&roots, &HashSet::new());
        assert_eq!(reconciler.selection().project_id, Some(a.uuid));
    }
}
