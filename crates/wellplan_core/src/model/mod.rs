//! Persistent data model of the well ownership tree.
//!
//! # Responsibility
//! - Define the records held by the entity store.
//! - Name every owned collection and its owning relationship.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId` that is never reused.
//! - Every owned record points at exactly one live owner.
//! - Creation order is `(created_at, uuid)` ascending everywhere.

pub mod clock;
pub mod kind;
pub mod well;
