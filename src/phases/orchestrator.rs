//! Orchestrator for the complete merge operation
//!
//! This module coordinates all phases to provide a clean API for a merge,
//! whether it is driven by changelist ids or by an explicit file list.

use log::info;

use super::aggregate::NetActionMap;
use super::replicate::{ReplicateOptions, ReplicationReport};
use super::resolve::Resolution;
use super::{phase1, phase2, phase3};
use crate::changelist::ChangeSetId;
use crate::config::{RelayConfig, TargetSet};
use crate::error::{Error, Result};
use crate::p4::{P4Operations, Workspace};
use crate::path::DepotPath;

/// What a merge replicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeInput {
    /// Changelist ids, resolved and aggregated first.
    ChangeLists(Vec<ChangeSetId>),
    /// Depot paths, each replicated as an edit.
    Paths(Vec<DepotPath>),
}

/// A merge request.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub input: MergeInput,
    pub dry_run: bool,
    /// Sync every involved workspace before replicating.
    pub sync: bool,
    pub jobs: Option<usize>,
}

/// Everything a merge produced.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Present for changelist-driven merges.
    pub resolution: Option<Resolution>,
    pub actions: NetActionMap,
    pub report: ReplicationReport,
}

/// Sync each workspace to head, stopping at the first failure.
pub fn sync_workspaces<'w, I>(p4: &dyn P4Operations, workspaces: I) -> Result<()>
where
    I: IntoIterator<Item = &'w Workspace>,
{
    for workspace in workspaces {
        info!("Syncing workspace {} to the latest revision", workspace);
        p4.sync_workspace(workspace)?;
    }
    Ok(())
}

/// Execute the complete merge operation (Phases 1-3)
///
/// This orchestrates the complete pipeline:
/// 1. Sync the query workspace and every source and target workspace
///    (unless disabled, and never in a dry run)
/// 2. Resolve changelist ids to submitted changelists
/// 3. Aggregate their file actions into one net action per path
/// 4. Replicate the net actions into the target workspaces
///
/// Only a failed sync is an error; everything else is reported in the
/// returned `MergeOutcome`.
pub fn execute_merge(
    p4: &dyn P4Operations,
    config: &RelayConfig,
    request: &MergeRequest,
) -> Result<MergeOutcome> {
    let targets = TargetSet::from_config(config)?;
    let query = config
        .query_workspace()
        .ok_or_else(|| Error::ConfigParse {
            message: "No workspace available for changelist queries".to_string(),
            hint: Some("Set `source: { root: ... }`".to_string()),
        })?
        .clone();

    if request.sync && !request.dry_run {
        let mut workspaces = vec![&query];
        for ws in targets.workspaces() {
            if !workspaces.contains(&ws) {
                workspaces.push(ws);
            }
        }
        sync_workspaces(p4, workspaces)?;
    }

    let (resolution, actions) = match &request.input {
        MergeInput::ChangeLists(ids) => {
            // Phase 1: Resolution
            let resolution = phase1::execute(p4, &query, config.review_scan_limit, ids);
            info!(
                "Resolved {} changelist(s): {:?}",
                resolution.resolved.len(),
                resolution
                    .resolved
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            );

            // Phase 2: Aggregation
            let actions = phase2::execute(p4, &query, &resolution.resolved);
            (Some(resolution), actions)
        }
        MergeInput::Paths(paths) => (None, NetActionMap::from_paths(paths.iter().cloned())),
    };
    info!("{} file(s) to process", actions.len());

    // Phase 3: Replication
    let report = phase3::execute(
        p4,
        &targets,
        &actions,
        ReplicateOptions {
            dry_run: request.dry_run,
            jobs: request.jobs,
        },
    );

    Ok(MergeOutcome {
        resolution,
        actions,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse;
    use crate::p4::{P4Call, ScriptedP4};
    use std::path::PathBuf;

    fn config(source: &str, target: &str) -> RelayConfig {
        let yaml = format!(
            "targets:\n  - category: CLIENT\n    source: {{ root: {} }}\n    target: {{ root: {} }}\n",
            source, target
        );
        parse(&yaml).unwrap()
    }

    fn request(input: MergeInput, sync: bool, dry_run: bool) -> MergeRequest {
        MergeRequest {
            input,
            dry_run,
            sync,
            jobs: Some(1),
        }
    }

    #[test]
    fn test_sync_failure_aborts() {
        let p4 = ScriptedP4::new().failing_sync_in("/p4/target");
        let err = execute_merge(
            &p4,
            &config("/p4/source", "/p4/target"),
            &request(MergeInput::ChangeLists(vec![ChangeSetId::new(1)]), true, false),
        )
        .unwrap_err();
        assert!(matches!(err, Error::WorkspaceSync { .. }));
        // Nothing was resolved after the failed sync.
        assert!(!p4
            .calls()
            .iter()
            .any(|c| matches!(c, P4Call::Describe(_))));
    }

    #[test]
    fn test_each_workspace_synced_once() {
        let p4 = ScriptedP4::new();
        execute_merge(
            &p4,
            &config("/p4/source", "/p4/target"),
            &request(MergeInput::Paths(vec![]), true, false),
        )
        .unwrap();
        let synced: Vec<PathBuf> = p4
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                P4Call::Sync(root) => Some(root),
                _ => None,
            })
            .collect();
        assert_eq!(
            synced,
            vec![PathBuf::from("/p4/source"), PathBuf::from("/p4/target")]
        );
    }

    #[test]
    fn test_dry_run_skips_sync() {
        let p4 = ScriptedP4::new().failing_sync_in("/p4/source");
        let outcome = execute_merge(
            &p4,
            &config("/p4/source", "/p4/target"),
            &request(MergeInput::Paths(vec![]), true, true),
        )
        .unwrap();
        assert!(outcome.report.dry_run);
        assert!(!p4.mutated());
    }

    #[test]
    fn test_changelist_merge_reports_resolution() {
        let p4 = ScriptedP4::new();
        let outcome = execute_merge(
            &p4,
            &config("/p4/source", "/p4/target"),
            &request(
                MergeInput::ChangeLists(vec![ChangeSetId::new(99999)]),
                false,
                false,
            ),
        )
        .unwrap();
        let resolution = outcome.resolution.unwrap();
        assert!(resolution.resolved.is_empty());
        assert_eq!(
            resolution.notes,
            vec!["Changelist 99999 does not exist in the system".to_string()]
        );
        assert!(outcome.actions.is_empty());
        assert_eq!(outcome.report.total(), 0);
    }
}
