//! Identity resolution across context boundaries.
//!
//! # Responsibility
//! - Resolve stable ids to rows held by one specific store context.
//! - Load the owned-id graph of a well or project for deletion planning.
//! - Resolve ids against the latest observed root collection.
//!
//! # Invariants
//! - Only ids cross a context boundary; rows are always re-read on arrival.
//! - A missing id resolves to `None`, never to an error.

mod graph;
mod roots;

pub use graph::{IdentityResolver, OwnedGroup, ProjectGraph, WellGraph};
pub use roots::{load_roots, RootCollection, RootEntry};
