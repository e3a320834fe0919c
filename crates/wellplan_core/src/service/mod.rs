//! Interactive use-case services.
//!
//! # Responsibility
//! - Expose the selection-aware command surface consumers call.
//! - Keep presentation layers decoupled from store contexts and threads.

pub mod naming;
pub mod workspace;
