//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which parses the
//! `.cl-relay.yaml` configuration file and checks it without contacting the
//! server:
//!
//! - **Structure**: unknown keys and malformed values are rejected.
//! - **Targets**: at least one target, unique categories, exactly one default.
//! - **Patterns**: every category glob compiles.
//! - **Pipelines and bundles**: names are unique and pipelines have steps.
//!
//! This command is a safe, read-only operation that does not modify any files.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use cl_relay::config;
use cl_relay::output::{emoji, OutputConfig};

/// Validate the configuration file
#[derive(Args, Debug)]
pub struct ValidateArgs {}

/// Execute the `validate` command.
///
/// # Arguments
/// * `args` - The command arguments
/// * `config_path` - The configuration file picked from `--config` and the defaults
/// * `color_flag` - The value of the global --color flag ("always", "never", or "auto")
pub fn execute(_args: ValidateArgs, config_path: &Path, color_flag: &str) -> Result<()> {
    let out = OutputConfig::resolve(color_flag);
    println!(
        "{} Validating configuration: {}",
        emoji(&out, "🔍", "[SCAN]"),
        config_path.display()
    );

    let relay = match config::load(config_path) {
        Ok(relay) => relay,
        Err(e) => {
            println!(
                "{} Configuration is invalid: {}",
                emoji(&out, "❌", "[ERR]"),
                e
            );
            return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
        }
    };
    println!("{} Configuration is valid", emoji(&out, "✅", "[OK]"));

    println!("\n{} Configuration Summary:", emoji(&out, "📊", "[INFO]"));
    match relay.query_workspace() {
        Some(ws) => println!("   Query workspace: {}", ws),
        None => println!("   Query workspace: (none)"),
    }
    println!("   Targets: {}", relay.targets.len());
    for target in &relay.targets {
        println!(
            "     {}{}: {} -> {}",
            target.category,
            if target.default { " (default)" } else { "" },
            target.source,
            target.target
        );
    }
    println!("   Stream pipelines: {}", relay.streams.len());
    println!("   Bundles: {}", relay.bundles.len());
    println!("   Changelist file: {}", relay.changelist_path().display());
    Ok(())
}
