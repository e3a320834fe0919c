//! Selection state and its reconciliation against the live root collection.
//!
//! # Responsibility
//! - Hold the selected well and project ids for the interactive context.
//! - Recompute selection after every observed change.
//! - Clear selection synchronously before a deletion that would invalidate it.
//!
//! # Invariants
//! - After `reconcile`, each non-null id resolves in the given collection and
//!   is not pending deletion.
//! - Ids whose deletion is in flight are never (re)selected.
//! - "First" always means creation order `(created_at, uuid)`.

mod guard;
mod reconciler;

pub use guard::{apply_fallback, guard_deletion, PendingFallback};
pub use reconciler::{Selection, SelectionReconciler};
