//! Changelist identifiers, statuses and file actions.
//!
//! This module holds the plain data that flows through the relay pipeline,
//! along with the reader for the one on-disk input the core relies on: a
//! changelist file with one identifier per line.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::path::DepotPath;

/// A Perforce changelist number.
///
/// Ordering is numeric, so `9 < 10` regardless of how the ids were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeSetId(u64);

impl ChangeSetId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ChangeSetId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ChangeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChangeSetId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

/// How the version-control server sees a changelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSetStatus {
    /// Part of the permanent history.
    Submitted,
    /// Still pending, usually holding shelved files for review.
    PendingReview,
    /// The server knows nothing about it.
    NotFound,
}

/// The outcome of resolving a single changelist id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChangeSet {
    pub id: ChangeSetId,
    pub status: ChangeSetStatus,
    /// Submitted counterpart of a review. Only set for `PendingReview`.
    pub resolved_id: Option<ChangeSetId>,
    pub note: Option<String>,
}

impl ResolvedChangeSet {
    /// The id later stages should use: the submitted counterpart when one was
    /// found, otherwise the id itself. `None` for unknown changelists.
    pub fn effective_id(&self) -> Option<ChangeSetId> {
        match self.status {
            ChangeSetStatus::NotFound => None,
            _ => Some(self.resolved_id.unwrap_or(self.id)),
        }
    }
}

/// Normalized per-file action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileActionKind {
    Add,
    Edit,
    Delete,
}

impl FileActionKind {
    /// Normalize a raw `p4` action such as `move/add` or `integrate`.
    ///
    /// Returns `None` for actions that carry no content change to replicate
    /// (`purge`, `archive`, `import`, ...).
    pub fn from_p4_action(action: &str) -> Option<Self> {
        match action {
            "add" | "move/add" => Some(Self::Add),
            "edit" | "branch" | "integrate" => Some(Self::Edit),
            "delete" | "move/delete" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for FileActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a changelist's file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAction {
    pub path: DepotPath,
    pub kind: FileActionKind,
}

/// Parse the contents of a changelist file.
///
/// One token per line. Blank lines and lines that are not a plain decimal
/// number are ignored, duplicates are collapsed, first-seen order is kept.
pub fn parse_changelist_list(content: &str) -> Vec<ChangeSetId> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|line| line.parse::<ChangeSetId>().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Read and parse a changelist file from disk.
pub fn read_changelist_file(path: &Path) -> Result<Vec<ChangeSetId>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::InputList {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(parse_changelist_list(&content))
}

/// Parse a depot path list: one `//...` path per line, `#` comments and
/// blank lines ignored, duplicates collapsed.
pub fn parse_depot_path_list(content: &str) -> Vec<DepotPath> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(DepotPath::parse)
        .filter(|path| seen.insert(path.clone()))
        .collect()
}

/// Read and parse a depot path list file from disk.
pub fn read_depot_path_file(path: &Path) -> Result<Vec<DepotPath>> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::InputList {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(parse_depot_path_list(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ids_order_numerically() {
        let mut ids: Vec<ChangeSetId> = ["100", "9", "54321", "12345"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["9", "100", "12345", "54321"]);
    }

    #[test]
    fn test_normalize_p4_actions() {
        use FileActionKind::*;
        assert_eq!(FileActionKind::from_p4_action("add"), Some(Add));
        assert_eq!(FileActionKind::from_p4_action("move/add"), Some(Add));
        assert_eq!(FileActionKind::from_p4_action("edit"), Some(Edit));
        assert_eq!(FileActionKind::from_p4_action("branch"), Some(Edit));
        assert_eq!(FileActionKind::from_p4_action("integrate"), Some(Edit));
        assert_eq!(FileActionKind::from_p4_action("delete"), Some(Delete));
        assert_eq!(FileActionKind::from_p4_action("move/delete"), Some(Delete));
        assert_eq!(FileActionKind::from_p4_action("purge"), None);
        assert_eq!(FileActionKind::from_p4_action(""), None);
    }

    #[test]
    fn test_parse_changelist_list_filters_and_dedupes() {
        let content = "12345\n\n  98765  \nnot-a-cl\n12345\n-5\n1e3\n54321\n";
        let ids = parse_changelist_list(content);
        let rendered: Vec<u64> = ids.iter().map(|id| id.get()).collect();
        assert_eq!(rendered, vec![12345, 98765, 54321]);
    }

    #[test]
    fn test_parse_changelist_list_handles_crlf() {
        let ids = parse_changelist_list("1\r\n2\r\n");
        assert_eq!(ids, vec![ChangeSetId::new(1), ChangeSetId::new(2)]);
    }

    #[test]
    fn test_effective_id() {
        let submitted = ResolvedChangeSet {
            id: ChangeSetId::new(10),
            status: ChangeSetStatus::Submitted,
            resolved_id: None,
            note: None,
        };
        assert_eq!(submitted.effective_id(), Some(ChangeSetId::new(10)));

        let review = ResolvedChangeSet {
            id: ChangeSetId::new(11),
            status: ChangeSetStatus::PendingReview,
            resolved_id: Some(ChangeSetId::new(12)),
            note: None,
        };
        assert_eq!(review.effective_id(), Some(ChangeSetId::new(12)));

        let missing = ResolvedChangeSet {
            id: ChangeSetId::new(13),
            status: ChangeSetStatus::NotFound,
            resolved_id: None,
            note: None,
        };
        assert_eq!(missing.effective_id(), None);
    }

    #[test]
    fn test_parse_depot_path_list() {
        let content = "# config tables\n//dcwc/Config/excel/Enemy.csv\n\n//dcwc/Config/excel/Skill.csv\nrelative/path.csv\n//dcwc/Config/excel/Enemy.csv\n";
        let paths = parse_depot_path_list(content);
        let rendered: Vec<&str> = paths.iter().map(DepotPath::as_str).collect();
        assert_eq!(
            rendered,
            vec!["//dcwc/Config/excel/Enemy.csv", "//dcwc/Config/excel/Skill.csv"]
        );
    }

    #[test]
    fn test_read_changelist_file_missing() {
        let temp = TempDir::new().unwrap();
        let err = read_changelist_file(&temp.path().join("changelists.txt")).unwrap_err();
        assert!(err.to_string().contains("changelists.txt"));
    }

    #[test]
    fn test_read_changelist_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("changelists.txt");
        std::fs::write(&path, "3\n1\n2\n1\n").unwrap();
        let ids = read_changelist_file(&path).unwrap();
        assert_eq!(
            ids,
            vec![ChangeSetId::new(3), ChangeSetId::new(1), ChangeSetId::new(2)]
        );
    }
}
