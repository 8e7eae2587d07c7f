//! Implementation of the phases of a relay merge.
//!
//! ## Overview
//!
//! A merge follows 3 phases:
//! 1. Resolution - Validate changelist ids and swap review changelists for
//!    their submitted counterparts
//! 2. Aggregation - Fold the file actions of every changelist, in ascending
//!    order, into one net action per depot path
//! 3. Replication - Apply each net action to the target workspace of its
//!    category, opening the files in lazily created change-lists
//!
//! Merging an explicit list of depot paths skips phases 1 and 2.
//!
//! Each phase depends only on the previous phases and on the foundation
//! modules (`changelist`, `path`, `p4`, `config`). The orchestrator wires
//! them together, including the workspace sync that precedes a merge.

pub mod aggregate;
pub mod orchestrator;
pub mod replicate;
pub mod resolve;

// Re-export phase modules under their position in the pipeline
pub use aggregate as phase2;
pub use replicate as phase3;
pub use resolve as phase1;
