//! # Stream Integration
//!
//! Runs configured stream pipelines: chains of `p4 integrate` steps that
//! carry changes from one stream to the next (staging to trunk, trunk to a
//! patch stream, ...).
//!
//! Each step switches the pipeline's workspace to the destination stream,
//! syncs it, opens a change-list and integrates into it. A step with nothing
//! to integrate deletes its empty change-list. A failed step is reported and
//! the pipeline moves on to the next one.

use log::{error, info, warn};

use crate::changelist::ChangeSetId;
use crate::config::{RelayConfig, StreamPipeline, StreamStep};
use crate::error::{Error, Result};
use crate::p4::{parse, P4Operations};

/// How one integration step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to integrate.
    UpToDate,
    /// Files were integrated and resolved into this change-list.
    Opened(ChangeSetId),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub from: String,
    pub to: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub name: String,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    pub fn has_failures(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }
}

/// Run every step of one pipeline, in order.
pub fn run_pipeline(p4: &dyn P4Operations, pipeline: &StreamPipeline) -> PipelineReport {
    info!("Running stream pipeline `{}`", pipeline.name);
    let steps = pipeline
        .steps
        .iter()
        .map(|step| StepReport {
            from: step.from.clone(),
            to: step.to.clone(),
            outcome: run_step(p4, pipeline, step),
        })
        .collect();
    PipelineReport {
        name: pipeline.name.clone(),
        steps,
    }
}

fn run_step(p4: &dyn P4Operations, pipeline: &StreamPipeline, step: &StreamStep) -> StepOutcome {
    let workspace = &pipeline.workspace;
    info!("Integrating {} -> {}", step.from, step.to);

    if !p4.switch_stream(&step.to, workspace) {
        return fail(format!("could not switch {} to {}", workspace, step.to));
    }
    if let Err(e) = p4.sync_workspace(workspace) {
        return fail(e.to_string());
    }

    let description = format!("{} {} to {}", pipeline.description_prefix, step.from, step.to);
    let Some(cl) = p4.create_change_list(&description, workspace) else {
        return fail(format!("could not create a change-list in {}", workspace));
    };
    info!("Created CL {}", cl);

    let Some(output) = p4.integrate(cl, &step.from, &step.to, workspace) else {
        discard(p4, cl, pipeline);
        return fail(format!("p4 integrate failed for CL {}", cl));
    };

    if parse::nothing_to_integrate(&output) {
        info!("No changes to integrate into {}", step.to);
        discard(p4, cl, pipeline);
        return StepOutcome::UpToDate;
    }

    if !p4.resolve_change_list(cl, &pipeline.resolve_flags, workspace) {
        warn!("p4 resolve reported problems in CL {}; check it before submitting", cl);
    }
    info!("Integrated into {} in CL {}", step.to, cl);
    StepOutcome::Opened(cl)
}

fn discard(p4: &dyn P4Operations, cl: ChangeSetId, pipeline: &StreamPipeline) {
    if !p4.delete_change_list(cl, &pipeline.workspace) {
        warn!("Could not delete empty CL {}", cl);
    }
}

fn fail(reason: String) -> StepOutcome {
    error!("{}", reason);
    StepOutcome::Failed(reason)
}

/// Run the named pipelines, or all of them when `names` is empty.
pub fn run_pipelines(
    p4: &dyn P4Operations,
    config: &RelayConfig,
    names: &[String],
) -> Result<Vec<PipelineReport>> {
    let selected: Vec<&StreamPipeline> = if names.is_empty() {
        config.streams.iter().collect()
    } else {
        names
            .iter()
            .map(|name| {
                config.stream(name).ok_or_else(|| Error::ConfigParse {
                    message: format!("Unknown stream pipeline `{}`", name),
                    hint: Some(format!(
                        "Configured pipelines: {}",
                        config
                            .streams
                            .iter()
                            .map(|s| s.name.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )),
                })
            })
            .collect::<Result<_>>()?
    };
    Ok(selected
        .into_iter()
        .map(|pipeline| run_pipeline(p4, pipeline))
        .collect())
}
