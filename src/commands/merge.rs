//! # Merge Command Implementation
//!
//! Runs the full pipeline: sync, resolve, aggregate, replicate. The input is
//! either a changelist file (the default) or a depot path list given with
//! `--paths`, whose files are copied as edits.
//!
//! The command exits with status 1 when any file failed to replicate, after
//! printing the full report.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use cl_relay::changelist::read_depot_path_file;
use cl_relay::output::{emoji, report_lines, OutputConfig};
use cl_relay::phases::orchestrator::{execute_merge, MergeInput, MergeRequest};

use crate::cli::Session;

/// Replicate changelists into the target workspaces
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Changelist file (defaults to `changelist_file` from the configuration)
    #[arg(long, value_name = "FILE", conflicts_with = "paths")]
    pub changelists: Option<PathBuf>,

    /// Depot path list to replicate instead of changelists
    #[arg(long, value_name = "FILE")]
    pub paths: Option<PathBuf>,

    /// Show what would be done without opening change-lists or touching files
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not sync the workspaces first
    #[arg(long)]
    pub no_sync: bool,

    /// Number of files to replicate in parallel (1 runs sequentially)
    #[arg(short, long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,
}

/// Execute the `merge` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `session` - Loaded configuration and p4 client
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(args: MergeArgs, session: &Session, color_flag: &str) -> Result<()> {
    let out = OutputConfig::resolve(color_flag);
    let config = &session.config;

    let input = match &args.paths {
        Some(list) => MergeInput::Paths(read_depot_path_file(list)?),
        None => MergeInput::ChangeLists(super::changelist_ids(args.changelists.as_deref(), config)?),
    };

    if args.dry_run {
        println!("{} DRY RUN MODE - No changes will be made", emoji(&out, "🔎", "[DRY]"));
    }

    let request = MergeRequest {
        input,
        dry_run: args.dry_run,
        sync: config.sync_before_merge && !args.no_sync,
        jobs: args.jobs.map(usize::from),
    };
    let outcome = execute_merge(&session.p4, config, &request)?;

    if let Some(resolution) = &outcome.resolution {
        println!(
            "{} Resolved {} changelist(s): {}",
            emoji(&out, "🔍", "[SCAN]"),
            resolution.resolved.len(),
            resolution
                .resolved
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    for line in report_lines(&out, &outcome.report) {
        println!("{}", line);
    }

    if outcome.report.has_failures() {
        bail!("{} file(s) failed to replicate", outcome.report.failed.len());
    }
    Ok(())
}
