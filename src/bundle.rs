//! # Asset Bundles
//!
//! An asset bundle is a set of workspace-relative path templates expanded
//! from the entries of a JSON manifest. A manifest such as
//!
//! ```json
//! { "character": { "epic": [ { "id": 1042, "name": "Aria" } ] } }
//! ```
//!
//! combined with a template group `{ group: character.epic, prefix:
//! CHARACTER, paths: ["Assets/Banner#CHARACTER_ID"] }` yields
//! `Assets/Banner1042`. The expanded paths are then copied from the bundle's
//! source workspace to its target workspace in one change-list.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use log::{info, warn};
use serde_json::Value;

use crate::config::{BundleConfig, TargetContext, TemplateGroup};
use crate::error::{Error, Result};
use crate::p4::P4Operations;
use crate::phases::orchestrator::sync_workspaces;
use crate::phases::replicate::{ReplicateOptions, ReplicationReport, Replicator};

/// Read a manifest file.
pub fn load_manifest(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::Manifest {
        message: format!("cannot read {}: {}", path.display(), e),
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Follow a dotted key such as `character.epic`.
fn lookup<'v>(manifest: &'v Value, dotted: &str) -> Option<&'v Value> {
    dotted
        .split('.')
        .filter(|key| !key.is_empty())
        .try_fold(manifest, |value, key| value.get(key))
}

/// Placeholder/value pairs for one manifest entry, longest placeholder first.
fn placeholders(prefix: Option<&str>, entry: &serde_json::Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = entry
        .iter()
        .filter_map(|(field, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let field = field.to_uppercase();
            let name = match prefix {
                Some(prefix) => format!("#{}_{}", prefix.to_uppercase(), field),
                None => format!("#{}", field),
            };
            Some((name, value))
        })
        .collect();
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
    pairs
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

fn expand_group(group: &TemplateGroup, manifest: &Value, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = match lookup(manifest, &group.group) {
        None => {
            warn!("Manifest has no `{}`; skipping its templates", group.group);
            return Ok(());
        }
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            return Err(Error::Manifest {
                message: format!("`{}` is not an array", group.group),
            })
        }
    };

    for entry in entries {
        let Value::Object(fields) = entry else {
            return Err(Error::Manifest {
                message: format!("`{}` contains an entry that is not an object", group.group),
            });
        };
        let pairs = placeholders(group.prefix.as_deref(), fields);
        for template in &group.paths {
            let expanded = pairs
                .iter()
                .fold(template.clone(), |acc, (name, value)| acc.replace(name, value));
            let path = PathBuf::from(&expanded);
            if is_plain_relative(&path) {
                out.push(path);
            } else {
                warn!("Ignoring `{}`: not a plain relative path", expanded);
            }
        }
    }
    Ok(())
}

/// Expand every template group of `bundle` against `manifest`. Paths are
/// de-duplicated, keeping first-seen order.
pub fn expand_bundle(bundle: &BundleConfig, manifest: &Value) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for group in &bundle.groups {
        expand_group(group, manifest, &mut paths)?;
    }
    let mut seen = HashSet::new();
    paths.retain(|path| seen.insert(path.clone()));
    Ok(paths)
}

/// Options for a bundle run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleOptions {
    pub dry_run: bool,
    pub sync: bool,
    pub jobs: Option<usize>,
}

/// Result of a bundle run.
#[derive(Debug, Clone)]
pub struct BundleReport {
    pub paths: Vec<PathBuf>,
    pub report: ReplicationReport,
}

/// The replication context a bundle copies with.
pub fn bundle_context(bundle: &BundleConfig) -> TargetContext {
    let category = bundle.category.clone().unwrap_or_else(|| bundle.name.clone());
    let description = bundle
        .description
        .clone()
        .unwrap_or_else(|| format!("Auto-generated CL for {}", bundle.name));
    TargetContext::new(category, bundle.source.clone(), bundle.target.clone())
        .with_description(description)
}

/// Expand a bundle and copy its files into the target workspace.
pub fn run_bundle(
    p4: &dyn P4Operations,
    bundle: &BundleConfig,
    manifest: &Value,
    options: BundleOptions,
) -> Result<BundleReport> {
    let paths = expand_bundle(bundle, manifest)?;
    info!(
        "Found {} unique file/folder paths for bundle `{}`",
        paths.len(),
        bundle.name
    );

    let context = bundle_context(bundle);
    if paths.is_empty() {
        return Ok(BundleReport {
            paths,
            report: ReplicationReport {
                dry_run: options.dry_run,
                ..Default::default()
            },
        });
    }

    if options.sync && !options.dry_run {
        sync_workspaces(p4, [&context.source, &context.target])?;
    }

    let targets = crate::config::TargetSet::new(vec![context.clone()], &context.category)?;
    let replicator = Replicator::new(
        p4,
        &targets,
        ReplicateOptions {
            dry_run: options.dry_run,
            jobs: options.jobs,
        },
    );
    let report = replicator.replicate_relative(&context, &paths);
    Ok(BundleReport { paths, report })
}
