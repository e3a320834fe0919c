//! Store-backed resolver and owned-id graphs.

use crate::model::kind::EntityKind;
use crate::model::well::{EntityId, ProjectId, ProjectState, Well, WellId};
use crate::store::{EntityStore, StoreResult, WellQuery};
use log::debug;

/// Ids of every row owned by one project snapshot, grouped per collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectGraph {
    pub project_id: ProjectId,
    /// One entry per snapshot collection, in `EntityKind::SNAPSHOT_COLLECTIONS` order.
    pub collections: Vec<(EntityKind, Vec<EntityId>)>,
}

impl ProjectGraph {
    /// Graph of a project with every collection empty.
    pub fn empty(project_id: ProjectId) -> Self {
        Self {
            project_id,
            collections: EntityKind::SNAPSHOT_COLLECTIONS
                .iter()
                .map(|kind| (*kind, Vec::new()))
                .collect(),
        }
    }

    pub fn entity_count(&self) -> usize {
        1 + self
            .collections
            .iter()
            .map(|(_, ids)| ids.len())
            .sum::<usize>()
    }
}

/// A flat well-owned record (transfer or rental) and its cost lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedGroup {
    pub id: EntityId,
    pub cost_lines: Vec<EntityId>,
}

/// Ids of every row owned by one well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellGraph {
    pub well_id: WellId,
    /// Owned projects in creation order.
    pub projects: Vec<ProjectGraph>,
    pub transfers: Vec<OwnedGroup>,
    pub rentals: Vec<OwnedGroup>,
}

impl WellGraph {
    pub fn entity_count(&self) -> usize {
        let flat = |groups: &[OwnedGroup]| {
            groups
                .iter()
                .map(|group| 1 + group.cost_lines.len())
                .sum::<usize>()
        };
        1 + self
            .projects
            .iter()
            .map(ProjectGraph::entity_count)
            .sum::<usize>()
            + flat(&self.transfers)
            + flat(&self.rentals)
    }
}

/// Resolves ids to rows live in the wrapped context.
pub struct IdentityResolver<'ctx, S: EntityStore> {
    store: &'ctx S,
}

impl<'ctx, S: EntityStore> IdentityResolver<'ctx, S> {
    pub fn new(store: &'ctx S) -> Self {
        Self { store }
    }

    /// Resolves one well id in this context.
    pub fn resolve_well(&self, id: WellId) -> StoreResult<Option<Well>> {
        let mut wells = self.store.fetch_wells(&WellQuery::by_ids([id]))?;
        Ok(wells.pop())
    }

    /// Resolves one project id in this context.
    pub fn resolve_project(&self, id: ProjectId) -> StoreResult<Option<ProjectState>> {
        self.store.fetch_project(id)
    }

    /// Loads the owned-id graph of one project, or `None` if it is gone.
    pub fn load_project_graph(&self, id: ProjectId) -> StoreResult<Option<ProjectGraph>> {
        if self.resolve_project(id)?.is_none() {
            debug!("event=resolve module=resolve status=skip kind=project_state reason=missing");
            return Ok(None);
        }
        self.collect_project_graph(id).map(Some)
    }

    /// Loads the owned-id graph of one well, or `None` if it is gone.
    pub fn load_well_graph(&self, id: WellId) -> StoreResult<Option<WellGraph>> {
        if self.resolve_well(id)?.is_none() {
            debug!("event=resolve module=resolve status=skip kind=well reason=missing");
            return Ok(None);
        }

        let mut projects = Vec::new();
        for project in self.store.fetch_projects(Some(id))? {
            projects.push(self.collect_project_graph(project.uuid)?);
        }

        Ok(Some(WellGraph {
            well_id: id,
            projects,
            transfers: self.collect_groups(EntityKind::Transfer, EntityKind::TransferItem, id)?,
            rentals: self.collect_groups(EntityKind::Rental, EntityKind::RentalCharge, id)?,
        }))
    }

    fn collect_project_graph(&self, id: ProjectId) -> StoreResult<ProjectGraph> {
        let mut collections = Vec::with_capacity(EntityKind::SNAPSHOT_COLLECTIONS.len());
        for kind in EntityKind::SNAPSHOT_COLLECTIONS {
            collections.push((kind, self.store.fetch_owned_ids(kind, id)?));
        }
        Ok(ProjectGraph {
            project_id: id,
            collections,
        })
    }

    fn collect_groups(
        &self,
        kind: EntityKind,
        cost_kind: EntityKind,
        well_id: WellId,
    ) -> StoreResult<Vec<OwnedGroup>> {
        let mut groups = Vec::new();
        for id in self.store.fetch_owned_ids(kind, well_id)? {
            groups.push(OwnedGroup {
                id,
                cost_lines: self.store.fetch_owned_ids(cost_kind, id)?,
            });
        }
        Ok(groups)
    }
}
