//! A scripted `P4Operations` implementation for tests and benchmarks.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::changelist::ChangeSetId;
use crate::error::{Error, Result};
use crate::path::DepotPath;

use super::{P4Operations, WhereMapping, Workspace};

/// A recorded call against [`ScriptedP4`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum P4Call {
    Describe(ChangeSetId),
    DescribeFull(ChangeSetId),
    RecentSubmitted(usize),
    Where(DepotPath),
    CreateChangeList {
        workspace: PathBuf,
        description: String,
    },
    OpenForEdit {
        change_list: ChangeSetId,
        path: PathBuf,
    },
    Reconcile {
        change_list: ChangeSetId,
        path: PathBuf,
    },
    MarkDeleted {
        change_list: ChangeSetId,
        path: PathBuf,
    },
    Sync(PathBuf),
    SwitchStream {
        stream: String,
        workspace: PathBuf,
    },
    Integrate {
        change_list: ChangeSetId,
        from: String,
        to: String,
    },
    Resolve {
        change_list: ChangeSetId,
        flags: Vec<String>,
    },
    DeleteChangeList(ChangeSetId),
}

/// Answers `p4` queries from canned text and records every call.
///
/// Depot paths are mapped into any workspace through prefix views:
/// `with_view("//depot/main/", "")` places `//depot/main/a/b.txt` at
/// `<root>/a/b.txt`. Mutating operations succeed unless told otherwise and
/// never touch the filesystem.
#[derive(Debug)]
pub struct ScriptedP4 {
    describes: HashMap<ChangeSetId, String>,
    full_describes: HashMap<ChangeSetId, String>,
    recent: Vec<ChangeSetId>,
    views: Vec<(String, PathBuf)>,
    excluded: Vec<String>,
    next_change: AtomicU64,
    failing_allocations: HashSet<PathBuf>,
    rejected_paths: HashSet<PathBuf>,
    failing_edits: bool,
    failing_syncs: HashSet<PathBuf>,
    failing_streams: HashSet<String>,
    integrations: HashMap<(String, String), String>,
    calls: Mutex<Vec<P4Call>>,
}

impl Default for ScriptedP4 {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedP4 {
    pub fn new() -> Self {
        Self {
            describes: HashMap::new(),
            full_describes: HashMap::new(),
            recent: Vec::new(),
            views: Vec::new(),
            excluded: Vec::new(),
            next_change: AtomicU64::new(1000),
            failing_allocations: HashSet::new(),
            rejected_paths: HashSet::new(),
            failing_edits: false,
            failing_syncs: HashSet::new(),
            failing_streams: HashSet::new(),
            integrations: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Canned `p4 describe -s` output.
    pub fn with_describe(mut self, id: u64, synopsis: impl Into<String>) -> Self {
        self.describes.insert(ChangeSetId::new(id), synopsis.into());
        self
    }

    /// Canned `p4 describe` output. Falls back to the short form when unset.
    pub fn with_full_describe(mut self, id: u64, report: impl Into<String>) -> Self {
        self.full_describes.insert(ChangeSetId::new(id), report.into());
        self
    }

    /// Submitted changelists, newest first.
    pub fn with_recent(mut self, ids: &[u64]) -> Self {
        self.recent = ids.iter().copied().map(ChangeSetId::new).collect();
        self
    }

    pub fn with_view(mut self, depot_prefix: &str, relative: impl Into<PathBuf>) -> Self {
        self.views.push((depot_prefix.to_string(), relative.into()));
        self
    }

    /// Depot paths under this prefix are excluded from every workspace view.
    pub fn with_exclusion(mut self, depot_prefix: &str) -> Self {
        self.excluded.push(depot_prefix.to_string());
        self
    }

    /// First number handed out by `create_change_list`.
    pub fn starting_change(self, first: u64) -> Self {
        self.next_change.store(first, Ordering::SeqCst);
        self
    }

    /// `create_change_list` fails in the workspace rooted at `root`.
    pub fn failing_allocation_in(mut self, root: impl Into<PathBuf>) -> Self {
        self.failing_allocations.insert(root.into());
        self
    }

    /// `reconcile` and `mark_deleted` reject this local path.
    pub fn rejecting(mut self, local: impl Into<PathBuf>) -> Self {
        self.rejected_paths.insert(local.into());
        self
    }

    /// Every `open_for_edit` call fails.
    pub fn failing_edits(mut self) -> Self {
        self.failing_edits = true;
        self
    }

    pub fn failing_sync_in(mut self, root: impl Into<PathBuf>) -> Self {
        self.failing_syncs.insert(root.into());
        self
    }

    pub fn failing_switch_to(mut self, stream: &str) -> Self {
        self.failing_streams.insert(stream.to_string());
        self
    }

    /// Canned `p4 integrate` output for a stream pair. Pairs without an
    /// entry integrate nothing.
    pub fn with_integration(mut self, from: &str, to: &str, output: impl Into<String>) -> Self {
        self.integrations
            .insert((from.to_string(), to.to_string()), output.into());
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<P4Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Descriptions of the changelists created so far.
    pub fn created_change_lists(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                P4Call::CreateChangeList { description, .. } => Some(description),
                _ => None,
            })
            .collect()
    }

    /// Whether any call other than a read-only query was made.
    pub fn mutated(&self) -> bool {
        self.calls().iter().any(|call| {
            !matches!(
                call,
                P4Call::Describe(_)
                    | P4Call::DescribeFull(_)
                    | P4Call::RecentSubmitted(_)
                    | P4Call::Where(_)
            )
        })
    }

    fn record(&self, call: P4Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl P4Operations for ScriptedP4 {
    fn describe(&self, id: ChangeSetId, _workspace: &Workspace) -> Option<String> {
        self.record(P4Call::Describe(id));
        self.describes.get(&id).cloned()
    }

    fn describe_full(&self, id: ChangeSetId, _workspace: &Workspace) -> Option<String> {
        self.record(P4Call::DescribeFull(id));
        self.full_describes
            .get(&id)
            .or_else(|| self.describes.get(&id))
            .cloned()
    }

    fn recent_submitted(&self, limit: usize, _workspace: &Workspace) -> Vec<ChangeSetId> {
        self.record(P4Call::RecentSubmitted(limit));
        self.recent.iter().take(limit).copied().collect()
    }

    fn where_in_workspace(&self, depot: &DepotPath, workspace: &Workspace) -> Option<WhereMapping> {
        self.record(P4Call::Where(depot.clone()));
        if self.excluded.iter().any(|p| depot.as_str().starts_with(p)) {
            return None;
        }
        // Last matching view wins, as in a client spec.
        let (prefix, relative) = self
            .views
            .iter()
            .rev()
            .find(|(prefix, _)| depot.as_str().starts_with(prefix.as_str()))?;
        let rest = &depot.as_str()[prefix.len()..];
        let mut local = workspace.root.join(relative);
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            local.push(segment);
        }
        Some(WhereMapping {
            depot: depot.clone(),
            client: format!(
                "//{}/{}",
                workspace.client.as_deref().unwrap_or("scripted"),
                rest
            ),
            local,
        })
    }

    fn create_change_list(&self, description: &str, workspace: &Workspace) -> Option<ChangeSetId> {
        self.record(P4Call::CreateChangeList {
            workspace: workspace.root.clone(),
            description: description.to_string(),
        });
        if self.failing_allocations.contains(&workspace.root) {
            return None;
        }
        Some(ChangeSetId::new(
            self.next_change.fetch_add(1, Ordering::SeqCst),
        ))
    }

    fn open_for_edit(&self, change_list: ChangeSetId, local: &Path, _workspace: &Workspace) -> bool {
        self.record(P4Call::OpenForEdit {
            change_list,
            path: local.to_path_buf(),
        });
        !self.failing_edits
    }

    fn reconcile(&self, change_list: ChangeSetId, local: &Path, _workspace: &Workspace) -> bool {
        self.record(P4Call::Reconcile {
            change_list,
            path: local.to_path_buf(),
        });
        !self.rejected_paths.contains(local)
    }

    fn mark_deleted(&self, change_list: ChangeSetId, local: &Path, _workspace: &Workspace) -> bool {
        self.record(P4Call::MarkDeleted {
            change_list,
            path: local.to_path_buf(),
        });
        !self.rejected_paths.contains(local)
    }

    fn sync_workspace(&self, workspace: &Workspace) -> Result<()> {
        self.record(P4Call::Sync(workspace.root.clone()));
        if self.failing_syncs.contains(&workspace.root) {
            return Err(Error::WorkspaceSync {
                workspace: workspace.to_string(),
                message: "Connect to server failed; check $P4PORT.".to_string(),
            });
        }
        Ok(())
    }

    fn switch_stream(&self, stream: &str, workspace: &Workspace) -> bool {
        self.record(P4Call::SwitchStream {
            stream: stream.to_string(),
            workspace: workspace.root.clone(),
        });
        !self.failing_streams.contains(stream)
    }

    fn integrate(
        &self,
        change_list: ChangeSetId,
        from: &str,
        to: &str,
        _workspace: &Workspace,
    ) -> Option<String> {
        self.record(P4Call::Integrate {
            change_list,
            from: from.to_string(),
            to: to.to_string(),
        });
        Some(
            self.integrations
                .get(&(from.to_string(), to.to_string()))
                .cloned()
                .unwrap_or_default(),
        )
    }

    fn resolve_change_list(
        &self,
        change_list: ChangeSetId,
        flags: &[String],
        _workspace: &Workspace,
    ) -> bool {
        self.record(P4Call::Resolve {
            change_list,
            flags: flags.to_vec(),
        });
        true
    }

    fn delete_change_list(&self, change_list: ChangeSetId, _workspace: &Workspace) -> bool {
        self.record(P4Call::DeleteChangeList(change_list));
        true
    }
}
