//! Depot paths and their translation into workspace-local paths.
//!
//! A depot path (`//depot/project/file.txt`) names a versioned file
//! independently of any workspace. Replicating a change means finding where
//! that file lives in the source workspace, expressing it relative to the
//! source root, and re-anchoring that relative path under a target root.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::p4::{P4Operations, Workspace};

/// A repository-absolute path such as `//depot/main/src/lib.rs`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepotPath(String);

impl DepotPath {
    /// Accepts only paths in depot syntax (leading `//`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() > 2 && raw.starts_with("//") {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DepotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const CATEGORY_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Match a depot path against a category glob, ignoring case.
pub fn category_match(pattern: &Pattern, path: &DepotPath) -> bool {
    pattern.matches_with(path.as_str(), CATEGORY_MATCH)
}

/// Express `local_path` relative to `root`.
///
/// Returns `None` when the path does not live under the root.
pub fn relative_within(local_path: &Path, root: &Path) -> Option<PathBuf> {
    let local = normalize(local_path);
    let root = normalize(root);
    let relative = local.strip_prefix(&root).ok()?;
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative.to_path_buf())
    }
}

/// Re-anchor a workspace-relative path under another workspace root.
pub fn rebase(relative: &Path, root: &Path) -> PathBuf {
    root.join(relative)
}

// Lexical cleanup only: `p4 where` and configured roots may disagree on
// `.` segments and trailing separators.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Where a depot path lands in a source and a target workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedPath {
    pub source_local: PathBuf,
    pub relative: PathBuf,
    pub target_local: PathBuf,
}

/// Maps depot paths into workspaces through `p4 where`.
pub struct PathTranslator<'a> {
    p4: &'a dyn P4Operations,
}

impl<'a> PathTranslator<'a> {
    pub fn new(p4: &'a dyn P4Operations) -> Self {
        Self { p4 }
    }

    /// Local path of `depot_path` inside `workspace`, if the workspace view
    /// maps it.
    pub fn to_local_path(&self, depot_path: &DepotPath, workspace: &Workspace) -> Option<PathBuf> {
        self.p4
            .where_in_workspace(depot_path, workspace)
            .map(|mapping| mapping.local)
    }

    /// Translate a depot path from `source` into the matching location under
    /// `target`. The error string explains why the path could not be placed.
    pub fn translate(
        &self,
        depot_path: &DepotPath,
        source: &Workspace,
        target: &Workspace,
    ) -> Result<TranslatedPath, String> {
        let source_local = self.to_local_path(depot_path, source).ok_or_else(|| {
            format!(
                "not mapped in source workspace {}",
                source.root.display()
            )
        })?;
        let relative = relative_within(&source_local, &source.root).ok_or_else(|| {
            format!(
                "{} is outside source workspace root {}",
                source_local.display(),
                source.root.display()
            )
        })?;
        let target_local = rebase(&relative, &target.root);
        Ok(TranslatedPath {
            source_local,
            relative,
            target_local,
        })
    }
}
