//! # Bundle Command Implementation
//!
//! Expands a configured asset bundle against a JSON manifest and copies the
//! resulting files from the bundle's source workspace into its target
//! workspace, all in one change-list.
//!
//! ## Example
//!
//! ```bash
//! cl-relay bundle liveops --manifest liveops_manifest.json --dry-run
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Args;

use cl_relay::bundle::{load_manifest, run_bundle, BundleOptions};
use cl_relay::output::{emoji, report_lines, OutputConfig};

use crate::cli::Session;

/// Copy the files of an asset bundle into its target workspace
#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Name of the bundle in the configuration
    #[arg(value_name = "NAME")]
    pub name: String,

    /// JSON manifest the path templates are expanded against
    #[arg(short, long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Show what would be done without opening change-lists or touching files
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not sync the workspaces first
    #[arg(long)]
    pub no_sync: bool,
}

/// Execute the `bundle` command.
pub fn execute(args: BundleArgs, session: &Session, color_flag: &str) -> Result<()> {
    let out = OutputConfig::resolve(color_flag);
    let bundle = session.config.bundle(&args.name).ok_or_else(|| {
        anyhow!(
            "Unknown bundle `{}` (configured: {})",
            args.name,
            session
                .config
                .bundles
                .iter()
                .map(|b| b.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;
    let manifest = load_manifest(&args.manifest)?;

    let result = run_bundle(
        &session.p4,
        bundle,
        &manifest,
        BundleOptions {
            dry_run: args.dry_run,
            sync: !args.no_sync,
            jobs: None,
        },
    )?;

    println!(
        "{} Bundle `{}`: {} path(s)",
        emoji(&out, "📋", "[BUNDLE]"),
        bundle.name,
        result.paths.len()
    );
    for line in report_lines(&out, &result.report) {
        println!("{}", line);
    }

    if result.report.has_failures() {
        bail!("{} path(s) failed to copy", result.report.failed.len());
    }
    Ok(())
}
