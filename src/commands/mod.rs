//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `cl-relay`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args`, the loaded
//!   [`Session`](crate::cli::Session) and the global `--color` value.
//!
//! The `execute` function is responsible for printing; the `cl_relay` library
//! only logs.

pub mod bundle;
pub mod completions;
pub mod integrate;
pub mod merge;
pub mod resolve;
pub mod scan;
pub mod validate;

use std::path::Path;

use anyhow::{anyhow, Result};

use cl_relay::changelist::{read_changelist_file, ChangeSetId};
use cl_relay::config::RelayConfig;
use cl_relay::p4::Workspace;

/// The workspace changelists are described in.
pub(crate) fn query_workspace(config: &RelayConfig) -> Result<&Workspace> {
    config
        .query_workspace()
        .ok_or_else(|| anyhow!("No workspace available for changelist queries"))
}

/// Changelist ids from `explicit`, or from the configured changelist file.
pub(crate) fn changelist_ids(
    explicit: Option<&Path>,
    config: &RelayConfig,
) -> Result<Vec<ChangeSetId>> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.changelist_path());
    let ids = read_changelist_file(&path)?;
    log::info!("Read {} changelist id(s) from {}", ids.len(), path.display());
    Ok(ids)
}
