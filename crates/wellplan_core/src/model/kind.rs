//! Entity kinds and their ownership relationships.

use serde::{Deserialize, Serialize};

/// Every persisted entity type in the well ownership tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Root aggregate.
    Well,
    /// Project snapshot owned by a well.
    ProjectState,
    SurveyPoint,
    DrillStringSection,
    AnnulusSection,
    MudStep,
    FinalLayer,
    MudRecord,
    ProgramStage,
    /// Transfer record owned directly by a well.
    Transfer,
    /// Cost line owned by a transfer.
    TransferItem,
    /// Rental record owned directly by a well.
    Rental,
    /// Cost line owned by a rental.
    RentalCharge,
}

impl EntityKind {
    /// Child collections owned by one project snapshot, in plan order.
    pub const SNAPSHOT_COLLECTIONS: [EntityKind; 7] = [
        EntityKind::SurveyPoint,
        EntityKind::DrillStringSection,
        EntityKind::AnnulusSection,
        EntityKind::MudStep,
        EntityKind::FinalLayer,
        EntityKind::MudRecord,
        EntityKind::ProgramStage,
    ];

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            Self::Well => "wells",
            Self::ProjectState => "project_states",
            Self::SurveyPoint => "survey_points",
            Self::DrillStringSection => "drill_string_sections",
            Self::AnnulusSection => "annulus_sections",
            Self::MudStep => "mud_steps",
            Self::FinalLayer => "final_layers",
            Self::MudRecord => "mud_records",
            Self::ProgramStage => "program_stages",
            Self::Transfer => "transfers",
            Self::TransferItem => "transfer_items",
            Self::Rental => "rentals",
            Self::RentalCharge => "rental_charges",
        }
    }

    /// Kind of the owning entity. `None` for the root aggregate.
    pub fn owner_kind(self) -> Option<EntityKind> {
        match self {
            Self::Well => None,
            Self::ProjectState | Self::Transfer | Self::Rental => Some(Self::Well),
            Self::TransferItem => Some(Self::Transfer),
            Self::RentalCharge => Some(Self::Rental),
            Self::SurveyPoint
            | Self::DrillStringSection
            | Self::AnnulusSection
            | Self::MudStep
            | Self::FinalLayer
            | Self::MudRecord
            | Self::ProgramStage => Some(Self::ProjectState),
        }
    }

    /// Back-reference column pointing at the owner. `None` for the root aggregate.
    pub fn owner_column(self) -> Option<&'static str> {
        match self.owner_kind()? {
            Self::Well => Some("well_uuid"),
            Self::ProjectState => Some("project_uuid"),
            Self::Transfer => Some("transfer_uuid"),
            Self::Rental => Some("rental_uuid"),
            _ => None,
        }
    }

    /// Whether this kind is stored as a generic `OwnedRecord` row.
    pub fn is_record(self) -> bool {
        !matches!(self, Self::Well | Self::ProjectState)
    }

    /// Stable snake_case label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Well => "well",
            Self::ProjectState => "project_state",
            Self::SurveyPoint => "survey_point",
            Self::DrillStringSection => "drill_string_section",
            Self::AnnulusSection => "annulus_section",
            Self::MudStep => "mud_step",
            Self::FinalLayer => "final_layer",
            Self::MudRecord => "mud_record",
            Self::ProgramStage => "program_stage",
            Self::Transfer => "transfer",
            Self::TransferItem => "transfer_item",
            Self::Rental => "rental",
            Self::RentalCharge => "rental_charge",
        }
    }
}
