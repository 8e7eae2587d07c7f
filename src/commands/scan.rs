//! Scan command: resolve and aggregate without touching any workspace.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use cl_relay::output::{emoji, OutputConfig};
use cl_relay::phases::{phase1, phase2};

use crate::cli::Session;

/// Print the net action per file for the changelist file
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Changelist file (defaults to `changelist_file` from the configuration)
    #[arg(long, value_name = "FILE")]
    pub changelists: Option<PathBuf>,
}

pub fn execute(args: ScanArgs, session: &Session, color_flag: &str) -> Result<()> {
    let out = OutputConfig::resolve(color_flag);
    let config = &session.config;
    let ids = super::changelist_ids(args.changelists.as_deref(), config)?;
    let workspace = super::query_workspace(config)?;

    let resolution = phase1::execute(&session.p4, workspace, config.review_scan_limit, &ids);
    let actions = phase2::execute(&session.p4, workspace, &resolution.resolved);

    for (path, kind) in actions.iter() {
        println!("{:<6} {}", kind.as_str().to_uppercase(), path);
    }
    let (adds, edits, deletes) = actions.counts();
    println!(
        "{} {} file(s): {} add, {} edit, {} delete",
        emoji(&out, "📊", "[INFO]"),
        actions.len(),
        adds,
        edits,
        deletes
    );
    Ok(())
}
