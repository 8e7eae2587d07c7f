//! Text scraping for `p4` command output.
//!
//! Everything that depends on the exact shape of Perforce's human-readable
//! output lives here, so the rest of the crate works with typed values and
//! can be tested against canned fixtures.

use std::sync::LazyLock;

use regex::Regex;

use crate::changelist::{ChangeSetId, FileAction, FileActionKind};
use crate::path::DepotPath;

use super::WhereMapping;

static FILE_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.\.\.\s+(//.+?)#\d+\s+(\S+)$").expect("valid regex"));

static PENDING_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^Change \d+ by \S+.*\bpending\b").expect("valid regex")
});

static CHANGES_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Change (\d+)\b").expect("valid regex"));

static CHANGE_CREATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Change (\d+) created").expect("valid regex"));

static INLINE_REFERENCES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\bCL[:\s]+(\d+)").expect("valid regex"),
        Regex::new(r"(?i)\bChangelist[:\s]+(\d+)").expect("valid regex"),
        Regex::new(r"(?i)\bfrom[:\s]+(\d+)").expect("valid regex"),
        Regex::new(r"(?i)\brelated to[:\s]+(\d+)").expect("valid regex"),
    ]
});

/// Section headers that end the description block of `p4 describe`.
const SECTION_HEADERS: [&str; 4] = ["Affected files", "Shelved files", "Jobs fixed", "Differences"];

/// Whether a `p4 describe -s` synopsis belongs to a pending (review)
/// changelist. Any one signal is enough.
pub fn is_pending_review(synopsis: &str) -> bool {
    synopsis.contains("Shelved files")
        || synopsis.contains("*pending*")
        || PENDING_HEADER.is_match(synopsis)
}

/// File rows of a `p4 describe -s` synopsis, normalized.
///
/// Rows with actions that carry no content change are dropped.
pub fn parse_file_actions(synopsis: &str) -> Vec<FileAction> {
    synopsis
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("... //"))
        .filter_map(|line| {
            let captures = FILE_ROW.captures(line)?;
            let path = DepotPath::parse(&captures[1])?;
            let kind = FileActionKind::from_p4_action(&captures[2])?;
            Some(FileAction { path, kind })
        })
        .collect()
}

/// Changelist numbers listed by `p4 changes`, in output order.
pub fn parse_changes(output: &str) -> Vec<ChangeSetId> {
    output
        .lines()
        .filter_map(|line| CHANGES_ROW.captures(line.trim()))
        .filter_map(|captures| captures[1].parse().ok())
        .collect()
}

/// The number reported by `p4 change -i` ("Change 123 created.").
pub fn parse_change_created(output: &str) -> Option<ChangeSetId> {
    CHANGE_CREATED
        .captures(output)
        .and_then(|captures| captures[1].parse().ok())
}

/// Parse tagged `p4 -ztag where` output.
///
/// When several mapping lines apply, the last one wins; if that one is an
/// exclusion (`... unmap`) the file is not mapped.
pub fn parse_where_tagged(output: &str) -> Option<WhereMapping> {
    #[derive(Default)]
    struct Record {
        depot: Option<String>,
        client: Option<String>,
        local: Option<String>,
        unmap: bool,
    }

    let mut records: Vec<Record> = Vec::new();
    for line in output.lines() {
        let Some(field) = line.trim().strip_prefix("... ") else {
            continue;
        };
        let (key, value) = field.split_once(' ').unwrap_or((field, ""));
        if key == "depotFile" {
            records.push(Record::default());
        }
        let Some(record) = records.last_mut() else {
            continue;
        };
        match key {
            "depotFile" => record.depot = Some(value.to_string()),
            "clientFile" => record.client = Some(value.to_string()),
            "path" => record.local = Some(value.to_string()),
            "unmap" => record.unmap = true,
            _ => {}
        }
    }

    let last = records.pop()?;
    if last.unmap {
        return None;
    }
    Some(WhereMapping {
        depot: DepotPath::parse(last.depot.as_deref()?)?,
        client: last.client.unwrap_or_default(),
        local: last.local?.into(),
    })
}

/// Whether a submitted changelist's synopsis points back at `review`
/// ("integrated from 98765", "review 98765").
pub fn references_review(synopsis: &str, review: ChangeSetId) -> bool {
    let pattern = format!(r"(?i)\b(?:from|review)\s+#?{}\b", review);
    Regex::new(&pattern)
        .map(|re| re.is_match(synopsis))
        .unwrap_or(false)
}

/// The free-text description of a `p4 describe` report, without the header
/// line and without the file sections.
pub fn description_section(report: &str) -> String {
    let mut lines = report.lines().skip_while(|line| !line.starts_with("Change "));
    // header
    lines.next();
    lines
        .take_while(|line| {
            let trimmed = line.trim_start();
            !SECTION_HEADERS.iter().any(|h| trimmed.starts_with(h))
        })
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Changelist numbers referenced inline in a description, grouped by label
/// in the order `CL`, `Changelist`, `from`, `related to`.
pub fn inline_references(description: &str) -> Vec<ChangeSetId> {
    let mut found = Vec::new();
    for pattern in INLINE_REFERENCES.iter() {
        for captures in pattern.captures_iter(description) {
            if let Ok(id) = captures[1].parse::<ChangeSetId>() {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
    }
    found
}

/// Whether `p4 integrate` output says there was nothing to do.
pub fn nothing_to_integrate(output: &str) -> bool {
    output.trim().is_empty()
        || output.contains("all revision(s) already integrated")
        || output.contains("no such file(s)")
}

/// Whether a failed `p4 integrate` only reported that there was nothing to do.
/// Unlike [`nothing_to_integrate`], silence does not count.
pub fn already_integrated(stderr: &str) -> bool {
    !stderr.trim().is_empty() && nothing_to_integrate(stderr)
}
