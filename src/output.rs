//! Terminal presentation for the `cl-relay` commands.
//!
//! Every command prints its report through an [`OutputConfig`]. When styling
//! is on, markers are emoji and skips and failures are colored. When it is
//! off, markers fall back to bracketed tags such as `[OK]` and `[FAIL]`,
//! which is also what the end-to-end tests and log scrapers match on.
//!
//! `--color auto` turns styling off for `NO_COLOR`, `CLICOLOR=0`,
//! `TERM=dumb` and non-terminal stdout. `CLICOLOR_FORCE` overrides the
//! terminal check.

use std::env;

use console::style;

use crate::phases::replicate::{ReportEntry, ReplicationReport};

/// Whether command output is styled.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the `--color` flag (`always`, `never` or `auto`).
    pub fn resolve(color_flag: &str) -> Self {
        let use_color = match color_flag.to_ascii_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => auto_color(
                |name| env::var_os(name).map(|v| v.to_string_lossy().into_owned()),
                console::Term::stdout().features().colors_supported(),
            ),
        };
        Self { use_color }
    }

    pub fn styled() -> Self {
        Self { use_color: true }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }
}

fn auto_color(var: impl Fn(&str) -> Option<String>, terminal: bool) -> bool {
    if var("NO_COLOR").is_some() || var("CLICOLOR").as_deref() == Some("0") {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| !v.is_empty() && v != "0") {
        return true;
    }
    if var("TERM").as_deref() == Some("dumb") {
        return false;
    }
    terminal
}

/// The emoji marker when styled, otherwise the bracketed tag.
pub fn emoji<'a>(config: &OutputConfig, symbol: &'a str, tag: &'a str) -> &'a str {
    if config.use_color {
        symbol
    } else {
        tag
    }
}

/// Paint `text` yellow when colors are enabled.
pub fn warning(config: &OutputConfig, text: &str) -> String {
    if config.use_color {
        style(text).yellow().to_string()
    } else {
        text.to_string()
    }
}

/// Paint `text` red when colors are enabled.
pub fn failure(config: &OutputConfig, text: &str) -> String {
    if config.use_color {
        style(text).red().to_string()
    } else {
        text.to_string()
    }
}

fn entry_line(marker: &str, entry: &ReportEntry) -> String {
    let kind = entry
        .kind
        .map(|k| format!("{} ", k.as_str().to_uppercase()))
        .unwrap_or_default();
    format!(
        "{} {}{} [{}] {}",
        marker, kind, entry.path, entry.category, entry.message
    )
}

/// Human-readable lines for a replication report: every failure and skip,
/// each success, then the change-lists and a summary.
pub fn report_lines(out: &OutputConfig, report: &ReplicationReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.total() + report.change_lists.len() + 1);
    let ok = emoji(out, "✅", "[OK]");
    let skip = emoji(out, "⏭️", "[SKIP]");
    let fail = emoji(out, "❌", "[FAIL]");

    for entry in &report.succeeded {
        lines.push(entry_line(ok, entry));
    }
    for entry in &report.skipped {
        lines.push(warning(out, &entry_line(skip, entry)));
    }
    for entry in &report.failed {
        lines.push(failure(out, &entry_line(fail, entry)));
    }
    for (category, cl) in &report.change_lists {
        lines.push(format!(
            "{} {}: files are opened in CL {}",
            emoji(out, "📦", "[CL]"),
            category,
            cl
        ));
    }

    let prefix = if report.dry_run { "Dry run: " } else { "" };
    lines.push(format!(
        "{}{} succeeded, {} skipped, {} failed",
        prefix,
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    ));
    lines
}
