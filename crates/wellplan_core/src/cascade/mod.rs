//! Tiered cascade deletion.
//!
//! # Responsibility
//! - Turn an owned graph into an explicit, leaves-first list of flat batches.
//! - Execute a plan inside one isolated context and commit once.
//! - Run executions on short-lived background threads and report back.
//!
//! # Invariants
//! - Every batch deletes rows of one kind whose owners are deleted later.
//! - A plan never relies on the store to delete owned rows implicitly.
//! - Nothing is observable from a failed execution.

mod dispatch;
mod executor;
mod planner;

pub(crate) use dispatch::DELETION_THREAD_PREFIX;
pub use dispatch::{DeletionDispatcher, DeletionOutcome, DeletionTicket};
pub use executor::{execute, DeletionError, DeletionReport, DeletionTarget};
pub use planner::{plan_project, plan_projects, plan_well, DeletionBatch, DeletionPlan};
