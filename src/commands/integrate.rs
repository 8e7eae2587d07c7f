//! Integrate command: run the configured stream pipelines.

use anyhow::{bail, Result};
use clap::Args;

use cl_relay::integrate::{run_pipelines, StepOutcome};
use cl_relay::output::{emoji, failure, OutputConfig};

use crate::cli::Session;

/// Run stream integration pipelines
#[derive(Args, Debug)]
pub struct IntegrateArgs {
    /// Pipelines to run (all configured pipelines when omitted)
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,
}

pub fn execute(args: IntegrateArgs, session: &Session, color_flag: &str) -> Result<()> {
    let out = OutputConfig::resolve(color_flag);
    if session.config.streams.is_empty() {
        println!("{} No stream pipelines configured", emoji(&out, "ℹ️", "[INFO]"));
        return Ok(());
    }

    let reports = run_pipelines(&session.p4, &session.config, &args.names)?;

    let mut failed = 0;
    for report in &reports {
        println!("{} {}", emoji(&out, "🔀", "[PIPELINE]"), report.name);
        for step in &report.steps {
            let line = match &step.outcome {
                StepOutcome::UpToDate => format!(
                    "   {} {} -> {}: up to date",
                    emoji(&out, "✅", "[OK]"),
                    step.from,
                    step.to
                ),
                StepOutcome::Opened(cl) => format!(
                    "   {} {} -> {}: integrated in CL {}",
                    emoji(&out, "📦", "[CL]"),
                    step.from,
                    step.to,
                    cl
                ),
                StepOutcome::Failed(reason) => {
                    failed += 1;
                    failure(
                        &out,
                        &format!(
                            "   {} {} -> {}: {}",
                            emoji(&out, "❌", "[FAIL]"),
                            step.from,
                            step.to,
                            reason
                        ),
                    )
                }
            };
            println!("{}", line);
        }
    }

    if failed > 0 {
        bail!("{} integration step(s) failed", failed);
    }
    Ok(())
}
