//! # Configuration Schema and Parsing
//!
//! This module defines the data structures that represent the `.cl-relay.yaml`
//! configuration file and the logic for parsing and validating it.
//!
//! ## Key Components
//!
//! - **`RelayConfig`**: The whole file. Global settings (change-list
//!   description, review scan limit, sync behaviour, changelist file) plus
//!   three lists: replication `targets`, stream integration `streams` and
//!   asset `bundles`.
//!
//! - **`TargetConfig`**: One replication category. Depot paths are routed to
//!   the first target whose glob patterns match; paths matching no pattern go
//!   to the default target.
//!
//! - **`TargetSet`**: The validated, compiled form of the targets, used by
//!   the replication phase to classify paths.
//!
//! ## Validation
//!
//! `validate` checks everything serde cannot: at least one target, unique
//! category names, exactly one default target (a lone target is the default
//! implicitly), compilable globs, unique stream and bundle names, and
//! non-empty stream pipelines. Every problem is reported as
//! [`Error::ConfigParse`] with a hint where one helps.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::p4::Workspace;
use crate::path::{category_match, DepotPath};

fn default_description() -> String {
    defaults::DEFAULT_DESCRIPTION.to_string()
}

fn default_scan_limit() -> usize {
    defaults::DEFAULT_REVIEW_SCAN_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_stream_prefix() -> String {
    "Merging".to_string()
}

/// Root of the `.cl-relay.yaml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Description for change-lists created by `merge`.
    #[serde(default = "default_description")]
    pub description: String,
    /// Number of recent submitted changelists searched when resolving a
    /// review to its submitted counterpart.
    #[serde(default = "default_scan_limit")]
    pub review_scan_limit: usize,
    /// Sync every involved workspace to head before replicating.
    #[serde(default = "default_true")]
    pub sync_before_merge: bool,
    /// Changelist file used when `--changelists` is not given. Relative
    /// paths are resolved against the configuration file's directory.
    #[serde(default)]
    pub changelist_file: Option<PathBuf>,
    /// Workspace used for changelist queries (`describe`, `changes`).
    /// Defaults to the default target's source workspace.
    #[serde(default)]
    pub source: Option<Workspace>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
    #[serde(default)]
    pub streams: Vec<StreamPipeline>,
    #[serde(default)]
    pub bundles: Vec<BundleConfig>,
    /// Directory of the file this configuration was read from.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// One replication category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    pub category: String,
    /// Receives every path that matches no other target's patterns.
    #[serde(default)]
    pub default: bool,
    /// Depot path globs, matched case-insensitively.
    #[serde(default)]
    pub patterns: Vec<String>,
    pub source: Workspace,
    pub target: Workspace,
    /// Overrides the global change-list description for this category.
    #[serde(default)]
    pub description: Option<String>,
}

/// A named chain of stream-to-stream integrations run in one workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamPipeline {
    pub name: String,
    pub workspace: Workspace,
    /// Change-lists are described as `"<prefix> <from> to <to>"`.
    #[serde(default = "default_stream_prefix")]
    pub description_prefix: String,
    #[serde(default = "defaults::default_resolve_flags")]
    pub resolve_flags: Vec<String>,
    #[serde(default)]
    pub steps: Vec<StreamStep>,
}

/// Integrate `from` into `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamStep {
    pub from: String,
    pub to: String,
}

/// A named set of path templates expanded from a JSON manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    pub name: String,
    /// Label used in the change-list report.
    #[serde(default)]
    pub category: Option<String>,
    pub source: Workspace,
    pub target: Workspace,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub groups: Vec<TemplateGroup>,
}

/// Path templates applied to every entry of one manifest array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateGroup {
    /// Dotted key into the manifest, e.g. `character.epic`.
    pub group: String,
    /// Placeholder prefix: with `CHARACTER`, field `id` is `#CHARACTER_ID`.
    #[serde(default)]
    pub prefix: Option<String>,
    pub paths: Vec<String>,
}

/// Parses a YAML string into a `RelayConfig`.
///
/// Only the shape is checked here; call [`RelayConfig::validate`] before use.
pub fn parse(yaml_content: &str) -> Result<RelayConfig> {
    serde_yaml::from_str::<RelayConfig>(yaml_content).map_err(Error::Yaml)
}

/// Parse a configuration from a YAML file path, remembering its directory.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<RelayConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::ConfigParse {
        message: format!("Cannot read {}: {}", path.display(), e),
        hint: Some("Pass --config <FILE> or create .cl-relay.yaml".to_string()),
    })?;
    let mut config = parse(&content)?;
    config.base_dir = path.parent().map(Path::to_path_buf);
    Ok(config)
}

/// Parse and validate a configuration file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<RelayConfig> {
    let config = from_file(path)?;
    config.validate()?;
    Ok(config)
}

fn config_error(message: String, hint: Option<&str>) -> Error {
    Error::ConfigParse {
        message,
        hint: hint.map(str::to_string),
    }
}

impl RelayConfig {
    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(config_error(
                "No targets configured".to_string(),
                Some("Add at least one entry under `targets:`"),
            ));
        }

        let mut categories = HashSet::new();
        for target in &self.targets {
            if target.category.trim().is_empty() {
                return Err(config_error(
                    "Target with an empty category name".to_string(),
                    None,
                ));
            }
            if !categories.insert(target.category.as_str()) {
                return Err(config_error(
                    format!("Duplicate target category `{}`", target.category),
                    None,
                ));
            }
            for pattern in &target.patterns {
                Pattern::new(pattern).map_err(|e| {
                    config_error(
                        format!(
                            "Invalid pattern `{}` in target `{}`: {}",
                            pattern, target.category, e
                        ),
                        None,
                    )
                })?;
            }
        }

        let defaults = self.targets.iter().filter(|t| t.default).count();
        if self.targets.len() > 1 && defaults != 1 {
            return Err(config_error(
                format!("{} targets are marked as default", defaults),
                Some("Keep `default: true` on exactly one target"),
            ));
        }

        let mut streams = HashSet::new();
        for stream in &self.streams {
            if !streams.insert(stream.name.as_str()) {
                return Err(config_error(
                    format!("Duplicate stream pipeline `{}`", stream.name),
                    None,
                ));
            }
            if stream.steps.is_empty() {
                return Err(config_error(
                    format!("Stream pipeline `{}` has no steps", stream.name),
                    Some("Add `steps: [{ from: //depot/a, to: //depot/b }]`"),
                ));
            }
        }

        let mut bundles = HashSet::new();
        for bundle in &self.bundles {
            if !bundles.insert(bundle.name.as_str()) {
                return Err(config_error(
                    format!("Duplicate bundle `{}`", bundle.name),
                    None,
                ));
            }
        }

        Ok(())
    }

    /// Workspace used for changelist queries.
    pub fn query_workspace(&self) -> Option<&Workspace> {
        self.source.as_ref().or_else(|| {
            self.targets
                .iter()
                .find(|t| t.default)
                .or_else(|| self.targets.first())
                .map(|t| &t.source)
        })
    }

    /// The changelist file, resolved against the configuration directory.
    pub fn changelist_path(&self) -> PathBuf {
        let file = self
            .changelist_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults::DEFAULT_CHANGELIST_FILE));
        match &self.base_dir {
            Some(dir) if file.is_relative() => dir.join(file),
            _ => file,
        }
    }

    pub fn stream(&self, name: &str) -> Option<&StreamPipeline> {
        self.streams.iter().find(|s| s.name == name)
    }

    pub fn bundle(&self, name: &str) -> Option<&BundleConfig> {
        self.bundles.iter().find(|b| b.name == name)
    }
}

/// A replication category with compiled patterns.
#[derive(Debug, Clone)]
pub struct TargetContext {
    pub category: String,
    pub source: Workspace,
    pub target: Workspace,
    /// Description for this category's change-list.
    pub description: String,
    patterns: Vec<Pattern>,
}

impl TargetContext {
    pub fn new(category: impl Into<String>, source: Workspace, target: Workspace) -> Self {
        Self {
            category: category.into(),
            source,
            target,
            description: defaults::DEFAULT_DESCRIPTION.to_string(),
            patterns: Vec::new(),
        }
    }

    pub fn with_patterns(mut self, patterns: &[&str]) -> Result<Self> {
        for pattern in patterns {
            self.patterns.push(Pattern::new(pattern)?);
        }
        Ok(self)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn matches(&self, path: &DepotPath) -> bool {
        self.patterns.iter().any(|p| category_match(p, path))
    }
}

/// All target contexts of a run, in configuration order.
#[derive(Debug, Clone)]
pub struct TargetSet {
    contexts: Vec<TargetContext>,
    default_index: usize,
}

impl TargetSet {
    /// Build from explicit contexts. `default_category` must name one of
    /// them.
    pub fn new(contexts: Vec<TargetContext>, default_category: &str) -> Result<Self> {
        let default_index = contexts
            .iter()
            .position(|c| c.category == default_category)
            .ok_or_else(|| {
                config_error(
                    format!("Default target `{}` is not configured", default_category),
                    None,
                )
            })?;
        Ok(Self {
            contexts,
            default_index,
        })
    }

    /// Compile the targets of a validated configuration.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.validate()?;
        let mut contexts = Vec::with_capacity(config.targets.len());
        let mut default_index = 0;
        for (index, target) in config.targets.iter().enumerate() {
            if target.default {
                default_index = index;
            }
            let patterns = target
                .patterns
                .iter()
                .map(|p| Pattern::new(p))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            contexts.push(TargetContext {
                category: target.category.clone(),
                source: target.source.clone(),
                target: target.target.clone(),
                description: target
                    .description
                    .clone()
                    .unwrap_or_else(|| config.description.clone()),
                patterns,
            });
        }
        Ok(Self {
            contexts,
            default_index,
        })
    }

    /// The context a depot path belongs to: the first whose patterns match,
    /// otherwise the default.
    pub fn classify(&self, path: &DepotPath) -> &TargetContext {
        self.contexts
            .iter()
            .find(|c| c.matches(path))
            .unwrap_or(&self.contexts[self.default_index])
    }

    pub fn contexts(&self) -> &[TargetContext] {
        &self.contexts
    }

    pub fn get(&self, category: &str) -> Option<&TargetContext> {
        self.contexts.iter().find(|c| c.category == category)
    }

    /// Every distinct workspace involved, sources first.
    pub fn workspaces(&self) -> Vec<&Workspace> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let sources = self.contexts.iter().map(|c| &c.source);
        let targets = self.contexts.iter().map(|c| &c.target);
        for ws in sources.chain(targets) {
            if seen.insert(ws) {
                out.push(ws);
            }
        }
        out
    }
}
