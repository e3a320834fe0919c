//! Core engine for well planning data.
//! Owns cascade-safe deletion of the well ownership tree and the
//! reconciliation of consumer selection against the live store.

pub mod cascade;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod resolve;
pub mod selection;
pub mod service;
pub mod store;

pub use cascade::{
    DeletionBatch, DeletionError, DeletionPlan, DeletionReport, DeletionTarget, DeletionTicket,
};
pub use config::{EngineConfig, WorkspaceConfig};
pub use logging::{
    active_log_settings, default_log_level, init_logging, init_logging_from_config, LogSettings,
    LoggingError,
};
pub use model::kind::EntityKind;
pub use model::well::{
    BaselineParameters, EntityId, OwnedRecord, ProjectId, ProjectState, Well, WellId,
};
pub use resolve::{IdentityResolver, RootCollection, RootEntry};
pub use selection::Selection;
pub use service::workspace::{
    CompletedDeletion, DeletionStatus, PumpSummary, Workspace, WorkspaceError, WorkspaceResult,
};
pub use store::{
    ContextOrigin, EntityStore, SqliteContainer, SqliteContext, StoreContainer, StoreError,
    StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
