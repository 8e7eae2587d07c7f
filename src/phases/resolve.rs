//! Phase 1: Resolution
//!
//! Changelist ids handed to a merge are whatever people pasted into the
//! changelist file. Some do not exist, and some are review changelists:
//! pending changelists whose shelved files were later submitted under a
//! different number. This phase classifies every id and, for reviews,
//! searches for the submitted counterpart.
//!
//! ## Finding a review's submitted changelist
//!
//! Two strategies are tried in order:
//!
//! 1.  **Back-reference scan**: the most recent submitted changelists are
//!     searched for one whose description says `from <id>` or `review <id>`.
//! 2.  **Inline reference**: the review's own description is searched for
//!     `CL`, `Changelist`, `from` or `related to` followed by a number; the
//!     first referenced changelist that is itself submitted wins.
//!
//! Nothing in this phase fails. Unknown ids and unresolved reviews become
//! notes, which callers print as warnings.

use std::collections::HashSet;

use log::{info, warn};

use crate::changelist::{ChangeSetId, ChangeSetStatus, ResolvedChangeSet};
use crate::p4::{parse, P4Operations, Workspace};

/// The result of resolving a batch of changelist ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Effective ids, unique and ascending.
    pub resolved: Vec<ChangeSetId>,
    /// Warnings, in input order.
    pub notes: Vec<String>,
    /// Per-id outcome, in input order after de-duplication.
    pub details: Vec<ResolvedChangeSet>,
}

/// Classifies changelist ids against the server.
pub struct ChangeSetResolver<'a> {
    p4: &'a dyn P4Operations,
    workspace: &'a Workspace,
    scan_limit: usize,
}

impl<'a> ChangeSetResolver<'a> {
    pub fn new(p4: &'a dyn P4Operations, workspace: &'a Workspace, scan_limit: usize) -> Self {
        Self {
            p4,
            workspace,
            scan_limit,
        }
    }

    /// Resolve one id. Never fails: problems are carried in the status and
    /// note of the result.
    pub fn resolve(&self, id: ChangeSetId) -> ResolvedChangeSet {
        let status = match self.classify(id) {
            Some(status) => status,
            None => {
                return ResolvedChangeSet {
                    id,
                    status: ChangeSetStatus::NotFound,
                    resolved_id: None,
                    note: Some(format!("Changelist {} does not exist in the system", id)),
                }
            }
        };

        if status == ChangeSetStatus::Submitted {
            return ResolvedChangeSet {
                id,
                status,
                resolved_id: None,
                note: None,
            };
        }

        let submitted = self
            .find_by_back_reference(id)
            .or_else(|| self.find_in_description(id));
        let note = match submitted {
            Some(actual) => {
                format!(
                    "Changelist {} is a review CL. Using actual CL {} instead.",
                    id, actual
                )
            }
            None => format!(
                "Changelist {} appears to be a review CL, but could not find the associated submitted changelist.",
                id
            ),
        };
        ResolvedChangeSet {
            id,
            status,
            resolved_id: submitted,
            note: Some(note),
        }
    }

    /// Resolve a batch: de-duplicate, resolve each id, drop unknown ids and
    /// return the unique effective ids in ascending order.
    pub fn resolve_all(&self, ids: &[ChangeSetId]) -> Resolution {
        let mut seen = HashSet::new();
        let details: Vec<ResolvedChangeSet> = ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .map(|id| self.resolve(id))
            .collect();

        let mut resolved: Vec<ChangeSetId> =
            details.iter().filter_map(|d| d.effective_id()).collect();
        resolved.sort_unstable();
        resolved.dedup();

        let notes: Vec<String> = details.iter().filter_map(|d| d.note.clone()).collect();
        for note in &notes {
            warn!("{}", note);
        }

        Resolution {
            resolved,
            notes,
            details,
        }
    }

    /// Status from the short description, without looking for counterparts.
    fn classify(&self, id: ChangeSetId) -> Option<ChangeSetStatus> {
        let synopsis = self.p4.describe(id, self.workspace)?;
        if parse::is_pending_review(&synopsis) {
            Some(ChangeSetStatus::PendingReview)
        } else {
            Some(ChangeSetStatus::Submitted)
        }
    }

    fn find_by_back_reference(&self, review: ChangeSetId) -> Option<ChangeSetId> {
        self.p4
            .recent_submitted(self.scan_limit, self.workspace)
            .into_iter()
            .filter(|candidate| *candidate != review)
            .find(|candidate| {
                self.p4
                    .describe(*candidate, self.workspace)
                    .is_some_and(|synopsis| parse::references_review(&synopsis, review))
            })
            .inspect(|found| info!("Review {} was submitted as {}", review, found))
    }

    fn find_in_description(&self, review: ChangeSetId) -> Option<ChangeSetId> {
        let report = self.p4.describe_full(review, self.workspace)?;
        let description = parse::description_section(&report);
        parse::inline_references(&description)
            .into_iter()
            .filter(|candidate| *candidate != review)
            .find(|candidate| self.classify(*candidate) == Some(ChangeSetStatus::Submitted))
            .inspect(|found| info!("Review {} references submitted {}", review, found))
    }
}

/// Executes Phase 1 of the pipeline.
pub fn execute(
    p4: &dyn P4Operations,
    workspace: &Workspace,
    scan_limit: usize,
    ids: &[ChangeSetId],
) -> Resolution {
    ChangeSetResolver::new(p4, workspace, scan_limit).resolve_all(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::p4::ScriptedP4;

    fn submitted(id: u64, description: &str) -> String {
        format!(
            "Change {} by alice@alice_ws on 2024/05/02 10:00:00\n\n\t{}\n\nAffected files ...\n\n... //dcwc/Config/excel/Enemy.csv#3 edit\n",
            id, description
        )
    }

    fn pending(id: u64, description: &str) -> String {
        format!(
            "Change {} by bob@bob_ws on 2024/05/01 09:00:00 *pending*\n\n\t{}\n\nShelved files ...\n\n... //dcwc/Config/excel/Skill.csv#2 edit\n",
            id, description
        )
    }

    fn ids(values: &[u64]) -> Vec<ChangeSetId> {
        values.iter().copied().map(ChangeSetId::new).collect()
    }

    #[test]
    fn test_submitted_changelist() {
        let p4 = ScriptedP4::new().with_describe(12345, submitted(12345, "Add enemies"));
        let ws = Workspace::new("/p4/source");
        let resolver = ChangeSetResolver::new(&p4, &ws, 100);

        let result = resolver.resolve(ChangeSetId::new(12345));
        assert_eq!(result.status, ChangeSetStatus::Submitted);
        assert_eq!(result.resolved_id, None);
        assert_eq!(result.note, None);
    }

    #[test]
    fn test_unknown_changelist() {
        let p4 = ScriptedP4::new();
        let ws = Workspace::new("/p4/source");
        let result = ChangeSetResolver::new(&p4, &ws, 100).resolve(ChangeSetId::new(99999));
        assert_eq!(result.status, ChangeSetStatus::NotFound);
        assert_eq!(
            result.note.as_deref(),
            Some("Changelist 99999 does not exist in the system")
        );
    }

    #[test]
    fn test_review_found_by_back_reference() {
        let p4 = ScriptedP4::new()
            .with_describe(500, pending(500, "Balance pass"))
            .with_describe(510, submitted(510, "Unrelated"))
            .with_describe(520, submitted(520, "Submitted review 500"))
            .with_recent(&[530, 520, 510]);
        let ws = Workspace::new("/p4/source");
        let result = ChangeSetResolver::new(&p4, &ws, 100).resolve(ChangeSetId::new(500));
        assert_eq!(result.status, ChangeSetStatus::PendingReview);
        assert_eq!(result.resolved_id, Some(ChangeSetId::new(520)));
        assert_eq!(
            result.note.as_deref(),
            Some("Changelist 500 is a review CL. Using actual CL 520 instead.")
        );
    }

    #[test]
    fn test_back_reference_respects_scan_limit() {
        let p4 = ScriptedP4::new()
            .with_describe(500, pending(500, "Balance pass"))
            .with_describe(510, submitted(510, "Unrelated"))
            .with_describe(520, submitted(520, "copied from 500"))
            .with_recent(&[510, 520]);
        let ws = Workspace::new("/p4/source");
        let result = ChangeSetResolver::new(&p4, &ws, 1).resolve(ChangeSetId::new(500));
        assert_eq!(result.resolved_id, None);
    }

    #[test]
    fn test_review_found_in_description() {
        let p4 = ScriptedP4::new()
            .with_describe(600, pending(600, "Skill tweaks\n\tCL: 601\n\tRelated to: 602"))
            .with_describe(601, pending(601, "Still pending"))
            .with_describe(602, submitted(602, "Skill tweaks"));
        let ws = Workspace::new("/p4/source");
        let result = ChangeSetResolver::new(&p4, &ws, 100).resolve(ChangeSetId::new(600));
        assert_eq!(result.resolved_id, Some(ChangeSetId::new(602)));
    }

    #[test]
    fn test_self_reference_is_ignored() {
        let p4 = ScriptedP4::new().with_describe(700, pending(700, "CL 700 rework"));
        let ws = Workspace::new("/p4/source");
        let result = ChangeSetResolver::new(&p4, &ws, 100).resolve(ChangeSetId::new(700));
        assert_eq!(result.status, ChangeSetStatus::PendingReview);
        assert_eq!(result.resolved_id, None);
        assert_eq!(
            result.note.as_deref(),
            Some("Changelist 700 appears to be a review CL, but could not find the associated submitted changelist.")
        );
    }

    #[test]
    fn test_resolve_all_scenario() {
        let p4 = ScriptedP4::new()
            .with_describe(12345, submitted(12345, "Enemies"))
            .with_describe(54321, submitted(54321, "Towers"))
            .with_describe(98765, pending(98765, "Skill balance\n\tRelated to: 98766"))
            .with_describe(98766, submitted(98766, "Skill balance"));
        let ws = Workspace::new("/p4/source");
        let resolution =
            ChangeSetResolver::new(&p4, &ws, 100).resolve_all(&ids(&[12345, 98765, 54321, 99999]));

        assert_eq!(resolution.resolved, ids(&[12345, 54321, 98766]));
        assert_eq!(
            resolution.notes,
            vec![
                "Changelist 98765 is a review CL. Using actual CL 98766 instead.".to_string(),
                "Changelist 99999 does not exist in the system".to_string(),
            ]
        );
        assert_eq!(resolution.details.len(), 4);
    }

    #[test]
    fn test_review_and_counterpart_appear_once() {
        let p4 = ScriptedP4::new()
            .with_describe(98765, pending(98765, "Related to: 98766"))
            .with_describe(98766, submitted(98766, "Skill balance"));
        let ws = Workspace::new("/p4/source");
        let resolution =
            ChangeSetResolver::new(&p4, &ws, 100).resolve_all(&ids(&[98766, 98765, 98765]));
        assert_eq!(resolution.resolved, ids(&[98766]));
        assert_eq!(resolution.details.len(), 2);
    }

    #[test]
    fn test_unresolved_review_is_kept() {
        let p4 = ScriptedP4::new().with_describe(800, pending(800, "No hints"));
        let ws = Workspace::new("/p4/source");
        let resolution = execute(&p4, &ws, 100, &ids(&[800]));
        assert_eq!(resolution.resolved, ids(&[800]));
        assert_eq!(resolution.notes.len(), 1);
    }

    #[test]
    fn test_resolve_all_is_idempotent() {
        let p4 = ScriptedP4::new()
            .with_describe(3, submitted(3, "c"))
            .with_describe(1, submitted(1, "a"))
            .with_describe(2, pending(2, "from: 3"));
        let ws = Workspace::new("/p4/source");
        let resolver = ChangeSetResolver::new(&p4, &ws, 100);
        let first = resolver.resolve_all(&ids(&[3, 2, 1, 42]));
        let second = resolver.resolve_all(&first.resolved);
        assert_eq!(first.resolved, ids(&[1, 3]));
        assert_eq!(second.resolved, first.resolved);
    }
}
