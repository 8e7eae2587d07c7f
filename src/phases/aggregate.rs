//! Phase 2: Aggregation
//!
//! Folds the file actions of an ordered list of changelists into one net
//! action per depot path.
//!
//! The fold is delete-dominant and first-write-otherwise:
//!
//! - the first action seen for a path is recorded;
//! - a later `Delete` overwrites whatever was recorded;
//! - a later `Add` or `Edit` leaves the record unchanged.
//!
//! A delete followed by a re-add therefore stays a delete. Replication copies
//! the head revision of the source file for every `Add`/`Edit`, so which of
//! the two was recorded first does not change the bytes written.

use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::changelist::{ChangeSetId, FileAction, FileActionKind};
use crate::p4::{parse, P4Operations, Workspace};
use crate::path::DepotPath;

/// Net disposition of each depot path touched by a set of changelists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetActionMap {
    actions: BTreeMap<DepotPath, FileActionKind>,
}

impl NetActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat every path as edited. Used when merging an explicit file list.
    pub fn from_paths<I: IntoIterator<Item = DepotPath>>(paths: I) -> Self {
        Self {
            actions: paths
                .into_iter()
                .map(|path| (path, FileActionKind::Edit))
                .collect(),
        }
    }

    /// Fold one action into the map.
    pub fn apply(&mut self, action: &FileAction) {
        match self.actions.get(&action.path) {
            None => {
                info!("Found [NEW] {}: {}", action.kind, action.path);
                self.actions.insert(action.path.clone(), action.kind);
            }
            Some(_) if action.kind == FileActionKind::Delete => {
                warn!("Found [DELETE OVERWRITE]: {}", action.path);
                self.actions
                    .insert(action.path.clone(), FileActionKind::Delete);
            }
            Some(existing) => {
                debug!(
                    "Keeping {} for {}, ignoring later {}",
                    existing, action.path, action.kind
                );
            }
        }
    }

    pub fn get(&self, path: &DepotPath) -> Option<FileActionKind> {
        self.actions.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Entries in depot path order.
    pub fn iter(&self) -> impl Iterator<Item = (&DepotPath, FileActionKind)> {
        self.actions.iter().map(|(path, kind)| (path, *kind))
    }

    /// Number of entries per kind, as `(add, edit, delete)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.actions
            .values()
            .fold((0, 0, 0), |(a, e, d), kind| match kind {
                FileActionKind::Add => (a + 1, e, d),
                FileActionKind::Edit => (a, e + 1, d),
                FileActionKind::Delete => (a, e, d + 1),
            })
    }
}

/// Aggregate the changelists `ids`, which should be unique and ascending.
pub fn aggregate(p4: &dyn P4Operations, workspace: &Workspace, ids: &[ChangeSetId]) -> NetActionMap {
    if ids.windows(2).any(|pair| pair[0] >= pair[1]) {
        warn!("Changelists are not in ascending order; processing them as given");
    }

    let mut map = NetActionMap::new();
    for id in ids {
        let Some(synopsis) = p4.describe(*id, workspace) else {
            warn!("Could not describe changelist {}; skipping it", id);
            continue;
        };
        let actions = parse::parse_file_actions(&synopsis);
        debug!("Changelist {} touches {} file(s)", id, actions.len());
        for action in &actions {
            map.apply(action);
        }
    }
    map
}

/// Executes Phase 2 of the pipeline.
pub fn execute(p4: &dyn P4Operations, workspace: &Workspace, ids: &[ChangeSetId]) -> NetActionMap {
    aggregate(p4, workspace, ids)
}
