//! Phase 3: Replication
//!
//! Applies a [`NetActionMap`] to the target workspaces. Every depot path is
//! routed to a category, translated from the category's source workspace to
//! its target workspace, and then copied or deleted there with the matching
//! `p4` bookkeeping (`edit`, `reconcile`, `delete`).
//!
//! ## Change-lists
//!
//! Each category collects its files in one change-list, created on the first
//! operation that actually needs one. A category whose files are all up to
//! date therefore creates nothing, which makes a repeated run a no-op. If
//! creating the change-list fails, every path of that category fails with
//! `no change-list`; other categories carry on.
//!
//! ## Concurrency
//!
//! Paths are processed in parallel with `rayon`. Creation of a category's
//! change-list is serialized by a per-category lock, so concurrent workers
//! of one category wait for the single allocation and then share it.
//! Report entries are sorted by path at the end, independent of scheduling.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::changelist::{ChangeSetId, FileActionKind};
use crate::config::{TargetContext, TargetSet};
use crate::p4::P4Operations;
use crate::path::{DepotPath, PathTranslator};

use super::aggregate::NetActionMap;

/// Message recorded for paths whose category has no change-list.
pub const NO_CHANGE_LIST: &str = "no change-list";

/// One path's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Depot path, or workspace-relative path for bundle copies.
    pub path: String,
    pub category: String,
    pub kind: Option<FileActionKind>,
    pub message: String,
}

/// What happened to every path of a replication run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    pub succeeded: Vec<ReportEntry>,
    pub skipped: Vec<ReportEntry>,
    pub failed: Vec<ReportEntry>,
    /// Change-list created per category.
    pub change_lists: BTreeMap<String, ChangeSetId>,
    pub dry_run: bool,
}

impl ReplicationReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    fn record(&mut self, outcome: Outcome, entry: ReportEntry) {
        match outcome {
            Outcome::Succeeded => self.succeeded.push(entry),
            Outcome::Skipped => self.skipped.push(entry),
            Outcome::Failed => self.failed.push(entry),
        }
    }

    fn sort(&mut self) {
        for list in [&mut self.succeeded, &mut self.skipped, &mut self.failed] {
            list.sort_by(|a, b| a.path.cmp(&b.path));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    Allocated(ChangeSetId),
    Failed,
}

/// Creates at most one change-list per category and hands it out.
pub struct ChangeListAllocator<'a> {
    p4: &'a dyn P4Operations,
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl<'a> ChangeListAllocator<'a> {
    pub fn new(p4: &'a dyn P4Operations) -> Self {
        Self {
            p4,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, category: &str) -> Arc<Mutex<Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(category.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Slot::Empty))),
        )
    }

    /// The category's change-list, created on first use.
    pub fn acquire(&self, context: &TargetContext) -> Option<ChangeSetId> {
        let slot = self.slot(&context.category);
        let mut state = slot.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            Slot::Allocated(cl) => Some(cl),
            Slot::Failed => None,
            Slot::Empty => {
                match self
                    .p4
                    .create_change_list(&context.description, &context.target)
                {
                    Some(cl) => {
                        info!("Target CL created: {} ({})", cl, context.category);
                        *state = Slot::Allocated(cl);
                        Some(cl)
                    }
                    None => {
                        error!(
                            "Could not create a change-list for {} in {}",
                            context.category, context.target
                        );
                        *state = Slot::Failed;
                        None
                    }
                }
            }
        }
    }

    /// Whether creating the category's change-list was tried and failed.
    pub fn has_failed(&self, category: &str) -> bool {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.get(category).map(Arc::clone)
        };
        slot.is_some_and(|slot| {
            matches!(
                *slot.lock().unwrap_or_else(PoisonError::into_inner),
                Slot::Failed
            )
        })
    }

    /// Change-lists created so far, by category.
    pub fn allocated(&self) -> BTreeMap<String, ChangeSetId> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .iter()
            .filter_map(|(category, slot)| {
                match *slot.lock().unwrap_or_else(PoisonError::into_inner) {
                    Slot::Allocated(cl) => Some((category.clone(), cl)),
                    _ => None,
                }
            })
            .collect()
    }
}

/// Options for a replication run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicateOptions {
    /// Classify and translate only.
    pub dry_run: bool,
    /// Worker threads; `None` uses the global rayon pool.
    pub jobs: Option<usize>,
}

/// Applies net actions to the target workspaces of a `TargetSet`.
pub struct Replicator<'a> {
    p4: &'a dyn P4Operations,
    targets: &'a TargetSet,
    options: ReplicateOptions,
}

impl<'a> Replicator<'a> {
    pub fn new(p4: &'a dyn P4Operations, targets: &'a TargetSet, options: ReplicateOptions) -> Self {
        Self {
            p4,
            targets,
            options,
        }
    }

    /// Replicate every entry of `actions`.
    pub fn replicate(&self, actions: &NetActionMap) -> ReplicationReport {
        let allocator = ChangeListAllocator::new(self.p4);
        let items: Vec<(&DepotPath, FileActionKind)> = actions.iter().collect();
        let results = self.run(&items, |(path, kind)| {
            self.replicate_one(path, *kind, &allocator)
        });
        self.finish(results, &allocator)
    }

    /// Copy workspace-relative paths from `context`'s source root to its
    /// target root. Directories are copied file by file.
    pub fn replicate_relative(
        &self,
        context: &TargetContext,
        paths: &[PathBuf],
    ) -> ReplicationReport {
        let allocator = ChangeListAllocator::new(self.p4);
        let mut files: Vec<(String, PathBuf, PathBuf)> = Vec::new();
        let mut results: Vec<(Outcome, ReportEntry)> = Vec::new();

        for relative in paths {
            let label = relative.display().to_string();
            let source = context.source.root.join(relative);
            if !source.exists() {
                warn!("[SKIP] Path not found in source: {}", label);
                results.push((
                    Outcome::Skipped,
                    entry(&label, context, None, "not found in source"),
                ));
                continue;
            }
            if source.is_dir() {
                debug!("[FOLDER] Processing folder: {}", label);
                for item in WalkDir::new(&source).sort_by_file_name() {
                    let item = match item {
                        Ok(item) => item,
                        Err(e) => {
                            results.push((
                                Outcome::Failed,
                                entry(&label, context, None, &e.to_string()),
                            ));
                            continue;
                        }
                    };
                    if !item.file_type().is_file() {
                        continue;
                    }
                    let Ok(inner) = item.path().strip_prefix(&context.source.root) else {
                        continue;
                    };
                    files.push((
                        inner.display().to_string(),
                        item.path().to_path_buf(),
                        context.target.root.join(inner),
                    ));
                }
            } else {
                files.push((label, source, context.target.root.join(relative)));
            }
        }

        results.extend(self.run(&files, |(label, source, target)| {
            let (outcome, message) = self.copy_file(context, source, target, &allocator);
            (outcome, entry(label, context, None, &message))
        }));
        self.finish(results, &allocator)
    }

    fn run<T, F>(&self, items: &[T], work: F) -> Vec<(Outcome, ReportEntry)>
    where
        T: Sync,
        F: Fn(&T) -> (Outcome, ReportEntry) + Sync + Send,
    {
        match self.options.jobs {
            Some(1) => items.iter().map(&work).collect(),
            Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(|| items.par_iter().map(&work).collect()),
                Err(e) => {
                    warn!("Could not start {} workers ({}); running sequentially", jobs, e);
                    items.iter().map(&work).collect()
                }
            },
            None => items.par_iter().map(&work).collect(),
        }
    }

    fn finish(
        &self,
        results: Vec<(Outcome, ReportEntry)>,
        allocator: &ChangeListAllocator<'_>,
    ) -> ReplicationReport {
        let mut report = ReplicationReport {
            dry_run: self.options.dry_run,
            change_lists: allocator.allocated(),
            ..Default::default()
        };
        for (outcome, item) in results {
            report.record(outcome, item);
        }
        report.sort();
        report
    }

    fn replicate_one(
        &self,
        path: &DepotPath,
        kind: FileActionKind,
        allocator: &ChangeListAllocator<'_>,
    ) -> (Outcome, ReportEntry) {
        let context = self.targets.classify(path);
        let label = path.as_str();

        if allocator.has_failed(&context.category) {
            return (
                Outcome::Failed,
                entry(label, context, Some(kind), NO_CHANGE_LIST),
            );
        }

        let translator = PathTranslator::new(self.p4);
        let translated = match translator.translate(path, &context.source, &context.target) {
            Ok(translated) => translated,
            Err(reason) => {
                warn!("[SKIP] {}: {}", path, reason);
                return (
                    Outcome::Skipped,
                    entry(label, context, Some(kind), &reason),
                );
            }
        };

        let (outcome, message) = match kind {
            FileActionKind::Delete => {
                self.delete_file(context, &translated.target_local, allocator)
            }
            FileActionKind::Add | FileActionKind::Edit => self.copy_file(
                context,
                &translated.source_local,
                &translated.target_local,
                allocator,
            ),
        };
        match outcome {
            Outcome::Succeeded => info!("[OK] {} {}: {}", kind, path, message),
            Outcome::Skipped => debug!("[SKIP] {}: {}", path, message),
            Outcome::Failed => error!("[FAIL] {} {}: {}", kind, path, message),
        }
        (outcome, entry(label, context, Some(kind), &message))
    }

    fn delete_file(
        &self,
        context: &TargetContext,
        target: &Path,
        allocator: &ChangeListAllocator<'_>,
    ) -> (Outcome, String) {
        if !target.exists() {
            return (Outcome::Skipped, "not present in target".to_string());
        }
        if self.options.dry_run {
            return (Outcome::Succeeded, "would delete".to_string());
        }
        let Some(cl) = allocator.acquire(context) else {
            return (Outcome::Failed, NO_CHANGE_LIST.to_string());
        };
        if !self.p4.mark_deleted(cl, target, &context.target) {
            return (Outcome::Failed, "p4 delete was rejected".to_string());
        }
        match fs::remove_file(target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("Could not remove {}: {}", target.display(), e),
        }
        (Outcome::Succeeded, format!("deleted in CL {}", cl))
    }

    fn copy_file(
        &self,
        context: &TargetContext,
        source: &Path,
        target: &Path,
        allocator: &ChangeListAllocator<'_>,
    ) -> (Outcome, String) {
        if !source.is_file() {
            return (
                Outcome::Failed,
                format!("source file missing: {}", source.display()),
            );
        }
        let target_exists = target.is_file();
        if target_exists {
            match same_contents(source, target) {
                Ok(true) => return (Outcome::Skipped, "already up to date".to_string()),
                Ok(false) => {}
                Err(e) => debug!("Could not compare {}: {}", target.display(), e),
            }
        }
        if self.options.dry_run {
            let verb = if target_exists { "would update" } else { "would add" };
            return (Outcome::Succeeded, verb.to_string());
        }
        let Some(cl) = allocator.acquire(context) else {
            return (Outcome::Failed, NO_CHANGE_LIST.to_string());
        };

        // Restored when reconcile is rejected.
        let previous = if target_exists {
            match fs::read(target) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    return (
                        Outcome::Failed,
                        format!("cannot read {}: {}", target.display(), e),
                    )
                }
            }
        } else {
            None
        };

        if target_exists {
            if let Err(e) = make_writable(target) {
                debug!("Could not clear read-only on {}: {}", target.display(), e);
            }
            if !self.p4.open_for_edit(cl, target, &context.target) {
                debug!("p4 edit failed for {}; reconcile will pick it up", target.display());
            }
        }
        if let Some(parent) = target.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                return (
                    Outcome::Failed,
                    format!("cannot create {}: {}", parent.display(), e),
                );
            }
        }
        if let Err(e) = fs::copy(source, target) {
            return (Outcome::Failed, format!("copy failed: {}", e));
        }
        if !self.p4.reconcile(cl, target, &context.target) {
            if let Err(e) = roll_back(target, previous.as_deref()) {
                warn!("Could not restore {}: {}", target.display(), e);
            }
            return (Outcome::Failed, "p4 reconcile failed".to_string());
        }
        (Outcome::Succeeded, format!("copied in CL {}", cl))
    }
}

fn entry(
    path: &str,
    context: &TargetContext,
    kind: Option<FileActionKind>,
    message: &str,
) -> ReportEntry {
    ReportEntry {
        path: path.to_string(),
        category: context.category.clone(),
        kind,
        message: message.to_string(),
    }
}

fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    let mut left = io::BufReader::new(fs::File::open(a)?);
    let mut right = io::BufReader::new(fs::File::open(b)?);
    let mut left_buf = [0u8; 8192];
    let mut right_buf = [0u8; 8192];
    loop {
        let n = left.read(&mut left_buf)?;
        if n == 0 {
            return Ok(true);
        }
        right.read_exact(&mut right_buf[..n])?;
        if left_buf[..n] != right_buf[..n] {
            return Ok(false);
        }
    }
}

/// Put `target` back the way it was before a copy: the old bytes, or no file.
fn roll_back(target: &Path, previous: Option<&[u8]>) -> io::Result<()> {
    match previous {
        Some(bytes) => fs::write(target, bytes),
        None => match fs::remove_file(target) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        },
    }
}

// Perforce leaves synced files read-only until they are opened.
#[allow(clippy::permissions_set_readonly_false)]
fn make_writable(path: &Path) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    if permissions.readonly() {
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }
    Ok(())
}

/// Executes Phase 3 of the pipeline.
pub fn execute(
    p4: &dyn P4Operations,
    targets: &TargetSet,
    actions: &NetActionMap,
    options: ReplicateOptions,
) -> ReplicationReport {
    Replicator::new(p4, targets, options).replicate(actions)
}
