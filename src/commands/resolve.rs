//! # Resolve Command Implementation
//!
//! Prints the effective changelist ids for the changelist file: unknown ids
//! are dropped and reviews are replaced by their submitted counterparts.
//! Read-only.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use cl_relay::output::{emoji, warning, OutputConfig};
use cl_relay::phases::phase1;

use crate::cli::Session;

/// Resolve changelist ids
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Changelist file (defaults to `changelist_file` from the configuration)
    #[arg(long, value_name = "FILE")]
    pub changelists: Option<PathBuf>,
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs, session: &Session, color_flag: &str) -> Result<()> {
    let out = OutputConfig::resolve(color_flag);
    let config = &session.config;
    let ids = super::changelist_ids(args.changelists.as_deref(), config)?;
    let workspace = super::query_workspace(config)?;

    let resolution = phase1::execute(&session.p4, workspace, config.review_scan_limit, &ids);

    for note in &resolution.notes {
        println!("{} {}", emoji(&out, "⚠️", "[WARN]"), warning(&out, note));
    }
    for detail in &resolution.details {
        match (detail.effective_id(), detail.resolved_id) {
            (Some(_), Some(submitted)) => println!("{} -> {}", detail.id, submitted),
            (Some(id), None) => println!("{}", id),
            (None, _) => {}
        }
    }
    println!(
        "{} {} changelist(s) resolved",
        emoji(&out, "✅", "[OK]"),
        resolution.resolved.len()
    );
    Ok(())
}
