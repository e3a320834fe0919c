//! Observed root collection.

use crate::model::well::{EntityId, ProjectId, ProjectState, Well, WellId};
use crate::store::{EntityStore, StoreResult, WellQuery};
use std::collections::{BTreeMap, HashSet};

/// One well together with its projects in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct RootEntry {
    pub well: Well,
    pub projects: Vec<ProjectState>,
}

impl RootEntry {
    pub fn id(&self) -> WellId {
        self.well.uuid
    }

    pub fn find_project(&self, id: ProjectId) -> Option<&ProjectState> {
        self.projects.iter().find(|project| project.uuid == id)
    }

    /// First project in creation order whose id is not in `excluded`.
    pub fn first_project_excluding(&self, excluded: &HashSet<EntityId>) -> Option<&ProjectState> {
        self.projects
            .iter()
            .find(|project| !excluded.contains(&project.uuid))
    }
}

/// Fresh, creation-ordered snapshot of every root and its projects.
///
/// Wells and projects are ordered by `(created_at, uuid)` so "first" is
/// deterministic even when two timestamps collide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootCollection {
    entries: Vec<RootEntry>,
}

impl RootCollection {
    /// Builds a collection and normalizes its ordering.
    pub fn from_entries(mut entries: Vec<RootEntry>) -> Self {
        entries.sort_by_key(|entry| entry.well.creation_key());
        for entry in &mut entries {
            entry.projects.sort_by_key(ProjectState::creation_key);
        }
        Self { entries }
    }

    /// Builds a collection from flat well and project listings.
    ///
    /// Projects whose well is not listed are dropped.
    pub fn from_parts(wells: Vec<Well>, projects: Vec<ProjectState>) -> Self {
        let mut grouped: BTreeMap<WellId, Vec<ProjectState>> = BTreeMap::new();
        for project in projects {
            grouped.entry(project.well_uuid).or_default().push(project);
        }
        let entries = wells
            .into_iter()
            .map(|well| {
                let projects = grouped.remove(&well.uuid).unwrap_or_default();
                RootEntry { well, projects }
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn entries(&self) -> &[RootEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn find_well(&self, id: WellId) -> Option<&RootEntry> {
        self.entries.iter().find(|entry| entry.well.uuid == id)
    }

    /// Resolves a project together with its owning root.
    pub fn find_project(&self, id: ProjectId) -> Option<(&RootEntry, &ProjectState)> {
        self.entries
            .iter()
            .find_map(|entry| entry.find_project(id).map(|project| (entry, project)))
    }

    pub fn owner_of(&self, project_id: ProjectId) -> Option<WellId> {
        self.find_project(project_id).map(|(entry, _)| entry.id())
    }

    /// First root in creation order whose id is not in `excluded`.
    pub fn first_well_excluding(&self, excluded: &HashSet<EntityId>) -> Option<&RootEntry> {
        self.entries
            .iter()
            .find(|entry| !excluded.contains(&entry.well.uuid))
    }

    pub fn well_ids(&self) -> Vec<WellId> {
        self.entries.iter().map(RootEntry::id).collect()
    }

    pub fn project_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.projects.len()).sum()
    }
}

/// Reads the full root collection through one context.
pub fn load_roots<S: EntityStore>(store: &S) -> StoreResult<RootCollection> {
    let wells = store.fetch_wells(&WellQuery::all())?;
    let projects = store.fetch_projects(None)?;
    Ok(RootCollection::from_parts(wells, projects))
}
