//! Pure deletion planning over owned-id graphs.

use crate::model::kind::EntityKind;
use crate::model::well::EntityId;
use crate::resolve::{OwnedGroup, ProjectGraph, WellGraph};

/// One flat step: delete these rows, all of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionBatch {
    pub kind: EntityKind,
    pub ids: Vec<EntityId>,
}

/// Ordered, leaves-first list of deletion batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    batches: Vec<DeletionBatch>,
}

impl DeletionPlan {
    pub fn batches(&self) -> &[DeletionBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total rows the plan deletes.
    pub fn entity_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.ids.len()).sum()
    }

    /// Appends every batch of `other` after the batches of `self`.
    pub fn extend(&mut self, other: DeletionPlan) {
        self.batches.extend(other.batches);
    }

    fn push(&mut self, kind: EntityKind, ids: Vec<EntityId>) {
        self.batches.push(DeletionBatch { kind, ids });
    }
}

/// Plans one project: one batch per owned collection, then the project.
///
/// Empty collections still get an (empty) batch so the plan shape does not
/// depend on the data.
pub fn plan_project(graph: &ProjectGraph) -> DeletionPlan {
    let mut plan = DeletionPlan::default();
    for kind in EntityKind::SNAPSHOT_COLLECTIONS {
        let ids = graph
            .collections
            .iter()
            .find(|(collection, _)| *collection == kind)
            .map(|(_, ids)| ids.clone())
            .unwrap_or_default();
        plan.push(kind, ids);
    }
    plan.push(EntityKind::ProjectState, vec![graph.project_id]);
    plan
}

/// Plans a set of projects back to back.
pub fn plan_projects(graphs: &[ProjectGraph]) -> DeletionPlan {
    let mut plan = DeletionPlan::default();
    for graph in graphs {
        plan.extend(plan_project(graph));
    }
    plan
}

/// Plans one well: its projects, then transfers and rentals with their cost
/// lines first, then the well itself.
pub fn plan_well(graph: &WellGraph) -> DeletionPlan {
    let mut plan = plan_projects(&graph.projects);
    push_groups(
        &mut plan,
        EntityKind::TransferItem,
        EntityKind::Transfer,
        &graph.transfers,
    );
    push_groups(
        &mut plan,
        EntityKind::RentalCharge,
        EntityKind::Rental,
        &graph.rentals,
    );
    plan.push(EntityKind::Well, vec![graph.well_id]);
    plan
}

fn push_groups(
    plan: &mut DeletionPlan,
    cost_kind: EntityKind,
    kind: EntityKind,
    groups: &[OwnedGroup],
) {
    let cost_lines = groups
        .iter()
        .flat_map(|group| group.cost_lines.iter().copied())
        .collect();
    plan.push(cost_kind, cost_lines);
    plan.push(kind, groups.iter().map(|group| group.id).collect());
}

#[cfg(test)]
mod tests {
    use super::{plan_project, plan_projects, plan_well};
    use crate::model::kind::EntityKind;
    use crate::resolve::{OwnedGroup, ProjectGraph, WellGraph};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn project_with(rows_per_collection: usize) -> ProjectGraph {
        let mut graph = ProjectGraph::empty(Uuid::new_v4());
        for (_, ids) in &mut graph.collections {
            ids.extend((0..rows_per_collection).map(|_| Uuid::new_v4()));
        }
        graph
    }

    #[test]
    fn project_plan_has_one_batch_per_collection_plus_owner() {
        for rows in [0, 1, 250] {
            let graph = project_with(rows);
            let plan = plan_project(&graph);
            assert_eq!(plan.len(), EntityKind::SNAPSHOT_COLLECTIONS.len() + 1);
            assert_eq!(plan.entity_count(), 7 * rows + 1);

            let last = plan.batches().last().unwrap();
            assert_eq!(last.kind, EntityKind::ProjectState);
            assert_eq!(last.ids, vec![graph.project_id]);
        }
    }

    #[test]
    fn project_plan_covers_every_collection_exactly_once() {
        let plan = plan_project(&project_with(2));
        let mut seen: HashMap<EntityKind, usize> = HashMap::new();
        for batch in &plan.batches()[..7] {
            *seen.entry(batch.kind).or_default() += 1;
        }
        for kind in EntityKind::SNAPSHOT_COLLECTIONS {
            assert_eq!(seen.get(&kind), Some(&1), "{kind:?} missing or duplicated");
        }
    }

    #[test]
    fn well_plan_deletes_every_owned_row_before_its_owner() {
        let transfer = OwnedGroup {
            id: Uuid::new_v4(),
            cost_lines: vec![Uuid::new_v4(), Uuid::new_v4()],
        };
        let rental = OwnedGroup {
            id: Uuid::new_v4(),
            cost_lines: vec![Uuid::new_v4()],
        };
        let graph = WellGraph {
            well_id: Uuid::new_v4(),
            projects: vec![project_with(1), project_with(3)],
            transfers: vec![transfer.clone()],
            rentals: vec![rental.clone()],
        };

        let plan = plan_well(&graph);
        assert_eq!(plan.len(), 2 * 8 + 5);
        assert_eq!(plan.entity_count(), graph.entity_count());

        let position = |kind: EntityKind, id: Uuid| {
            plan.batches()
                .iter()
                .position(|batch| batch.kind == kind && batch.ids.contains(&id))
                .unwrap()
        };
        for line in &transfer.cost_lines {
            assert!(
                position(EntityKind::TransferItem, *line)
                    < position(EntityKind::Transfer, transfer.id)
            );
        }
        assert!(
            position(EntityKind::RentalCharge, rental.cost_lines[0])
                < position(EntityKind::Rental, rental.id)
        );
        for project in &graph.projects {
            assert!(
                position(EntityKind::ProjectState, project.project_id)
                    < position(EntityKind::Well, graph.well_id)
            );
        }
        assert_eq!(plan.batches().last().unwrap().kind, EntityKind::Well);
    }

    #[test]
    fn empty_well_still_plans_flat_collections_and_root() {
        let graph = WellGraph {
            well_id: Uuid::new_v4(),
            projects: Vec::new(),
            transfers: Vec::new(),
            rentals: Vec::new(),
        };
        let plan = plan_well(&graph);
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.entity_count(), 1);
        assert!(plan_projects(&[]).is_empty());
    }
}
