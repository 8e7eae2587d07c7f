//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cl_relay::config::{self, RelayConfig};
use cl_relay::defaults;
use cl_relay::p4::CommandP4;

use crate::commands;

/// cl-relay - Replicate Perforce changelists between workspaces
#[derive(Parser, Debug)]
#[command(name = "cl-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to .cl-relay.yaml, then the per-user file)
    #[arg(long, global = true, value_name = "FILE", env = "CL_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// The p4 executable to run
    #[arg(
        long,
        global = true,
        value_name = "BIN",
        env = "CL_RELAY_P4",
        default_value = defaults::DEFAULT_P4_BINARY
    )]
    p4: PathBuf,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the changelist file to submitted changelist ids
    Resolve(commands::resolve::ResolveArgs),

    /// Resolve and aggregate changelists, printing one net action per file
    Scan(commands::scan::ScanArgs),

    /// Replicate changelists or a path list into the target workspaces
    Merge(commands::merge::MergeArgs),

    /// Run stream integration pipelines
    Integrate(commands::integrate::IntegrateArgs),

    /// Copy the files of an asset bundle into its target workspace
    Bundle(commands::bundle::BundleArgs),

    /// Validate the configuration file
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

/// Loaded configuration plus the p4 client every command talks through.
pub struct Session {
    pub config: RelayConfig,
    pub p4: CommandP4,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let color = self.color.as_str();
        let session = || -> Result<Session> {
            Ok(Session {
                config: load_config(self.config.as_deref())?,
                p4: CommandP4::new(self.p4.clone()),
            })
        };

        match self.command {
            Commands::Resolve(args) => commands::resolve::execute(args, &session()?, color),
            Commands::Scan(args) => commands::scan::execute(args, &session()?, color),
            Commands::Merge(args) => commands::merge::execute(args, &session()?, color),
            Commands::Integrate(args) => commands::integrate::execute(args, &session()?, color),
            Commands::Bundle(args) => commands::bundle::execute(args, &session()?, color),
            Commands::Validate(args) => {
                commands::validate::execute(args, &config_path(self.config.as_deref())?, color)
            }
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&filters);
    builder.format_timestamp(None);
    // A logger installed by an embedding process stays in place.
    let _ = builder.try_init();
}

fn config_path(explicit: Option<&std::path::Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    Ok(defaults::resolve_config_path(explicit, &cwd))
}

fn load_config(explicit: Option<&std::path::Path>) -> Result<RelayConfig> {
    let path = config_path(explicit)?;
    config::load(&path).with_context(|| format!("failed to load {}", path.display()))
}
