//! Well, project snapshot and owned record models.
//!
//! # Responsibility
//! - Define the canonical records for the root aggregate and its owned tree.
//! - Provide constructors that stamp identity and creation time.
//!
//! # Invariants
//! - `uuid` is stable and never reused for another entity.
//! - `created_at` never changes after construction.

use super::clock::next_timestamp_ms;
use super::kind::EntityKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every persisted entity.
pub type EntityId = Uuid;
/// Identifier of a root aggregate.
pub type WellId = Uuid;
/// Identifier of a project snapshot.
pub type ProjectId = Uuid;

/// Root aggregate of the ownership tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Well {
    pub uuid: WellId,
    pub name: String,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Well {
    /// Creates a new well with a generated id and creation timestamp.
    pub fn new(name: impl Into<String>) -> Self {
        let now = next_timestamp_ms();
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creation-order sort key. Equal timestamps fall back to id ordering.
    pub fn creation_key(&self) -> (i64, WellId) {
        (self.created_at, self.uuid)
    }
}

/// Scalar baseline parameters carried by a project snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineParameters {
    pub bit_depth_m: f64,
    pub hole_diameter_mm: f64,
    pub mud_density_kg_m3: f64,
    pub pump_rate_l_min: f64,
}

/// Named configuration snapshot owned by exactly one well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub uuid: ProjectId,
    pub well_uuid: WellId,
    pub name: String,
    pub baseline: BaselineParameters,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ProjectState {
    /// Creates a new project snapshot under `well_uuid` with default baseline values.
    pub fn new(well_uuid: WellId, name: impl Into<String>) -> Self {
        let now = next_timestamp_ms();
        Self {
            uuid: Uuid::new_v4(),
            well_uuid,
            name: name.into(),
            baseline: BaselineParameters::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn creation_key(&self) -> (i64, ProjectId) {
        (self.created_at, self.uuid)
    }
}

/// Generic owned row: snapshot collection element, transfer, rental or cost line.
///
/// The engine only needs identity, ownership and ordering for these rows; the
/// domain payload is reduced to a label and an optional amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedRecord {
    pub uuid: EntityId,
    pub kind: EntityKind,
    /// Back-reference to the owning entity.
    pub owner_uuid: EntityId,
    pub label: String,
    pub amount: Option<f64>,
    pub created_at: i64,
}

impl OwnedRecord {
    /// Creates a new owned record of `kind` under `owner_uuid`.
    pub fn new(kind: EntityKind, owner_uuid: EntityId, label: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            kind,
            owner_uuid,
            label: label.into(),
            amount: None,
            created_at: next_timestamp_ms(),
        }
    }

    /// Sets the optional amount.
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}
