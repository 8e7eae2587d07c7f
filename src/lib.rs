//! # cl-relay Library
//!
//! This library replicates Perforce changelists from a source workspace into
//! one or more target workspaces. It is designed to be used by the `cl-relay`
//! command-line tool, but every stage talks to Perforce through the
//! [`p4::P4Operations`] trait and can be driven by other tools as well.
//!
//! ## Quick Example
//!
//! ```
//! use cl_relay::changelist::{parse_changelist_list, ChangeSetId};
//! use cl_relay::config;
//!
//! // Changelist files are one id per line; junk lines are ignored
//! let ids = parse_changelist_list("12345\n\nnot-a-number\n12345\n54321\n");
//! assert_eq!(ids, vec![ChangeSetId::new(12345), ChangeSetId::new(54321)]);
//!
//! // Parse a configuration
//! let yaml = r#"
//! targets:
//!   - category: CLIENT
//!     source: { root: /p4/source }
//!     target: { root: /p4/target }
//! "#;
//! let relay = config::parse(yaml).unwrap();
//! assert_eq!(relay.targets.len(), 1);
//! ```
//!
//! ## Core Concepts
//!
//! - **Changelists (`changelist`)**: Ids, resolution status and per-file
//!   actions, plus the changelist and depot path list file formats.
//! - **Configuration (`config`)**: The `.cl-relay.yaml` schema: target
//!   categories, stream pipelines and asset bundles.
//! - **Perforce access (`p4`)**: The `P4Operations` seam, the `p4` command
//!   implementation and parsers for its output.
//! - **Paths (`path`)**: Depot paths and their translation from the source
//!   workspace to a target workspace.
//! - **Phases (`phases`)**: The merge pipeline.
//!
//! ## Execution Flow
//!
//! The main entry point is `phases::orchestrator::execute_merge`:
//!
//! 1.  **Sync**: Bring every involved workspace to head.
//! 2.  **Resolution**: Classify changelist ids, replacing reviews with their
//!     submitted counterparts.
//! 3.  **Aggregation**: Fold all file actions into one net action per depot
//!     path. Deletes dominate.
//! 4.  **Replication**: Copy or delete each file in its category's target
//!     workspace, opening one change-list per category on first use.
//!
//! Stream integration (`integrate`) and asset bundles (`bundle`) reuse the
//! same building blocks.

pub mod bundle;
pub mod changelist;
pub mod config;
pub mod defaults;
pub mod error;
pub mod integrate;
pub mod output;
pub mod p4;
pub mod path;
pub mod phases;
