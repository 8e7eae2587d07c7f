//! # Perforce Access
//!
//! Every interaction with the Perforce server goes through the
//! [`P4Operations`] trait. The relay pipeline only ever sees typed results:
//! `Option`/`bool` for per-item calls whose failure is reported as data, and
//! `Result` for workspace synchronization, which aborts a run.
//!
//! ## Implementations
//!
//! - [`CommandP4`] spawns the `p4` binary (or any drop-in replacement) with
//!   the workspace root as working directory, so `.p4config` files are
//!   honoured, and `-c <client>` when the workspace names a client.
//! - [`ScriptedP4`] answers from canned text and records every call. It is
//!   public so integration tests and benchmarks can drive the library
//!   without a server.
//!
//! All parsing of `p4` output lives in [`parse`].

pub mod parse;
mod scripted;

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::changelist::ChangeSetId;
use crate::error::{Error, Result};
use crate::path::DepotPath;

pub use scripted::{P4Call, ScriptedP4};

/// A Perforce workspace on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Workspace {
    /// Directory `p4` runs in.
    pub root: PathBuf,
    /// Client name passed as `p4 -c`. When absent, the client is taken from
    /// the environment or `.p4config` under `root`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            client: None,
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }
}

impl std::fmt::Display for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.client {
            Some(client) => write!(f, "{} ({})", self.root.display(), client),
            None => write!(f, "{}", self.root.display()),
        }
    }
}

/// One mapping reported by `p4 where`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereMapping {
    pub depot: DepotPath,
    pub client: String,
    pub local: PathBuf,
}

/// Trait for Perforce operations - allows scripting in tests
pub trait P4Operations: Send + Sync {
    /// Short description of a changelist (`p4 describe -s`). `None` when the
    /// changelist does not exist or the command failed.
    fn describe(&self, id: ChangeSetId, workspace: &Workspace) -> Option<String>;

    /// Full description of a changelist, including diffs (`p4 describe`).
    fn describe_full(&self, id: ChangeSetId, workspace: &Workspace) -> Option<String>;

    /// Most recent submitted changelists, newest first.
    fn recent_submitted(&self, limit: usize, workspace: &Workspace) -> Vec<ChangeSetId>;

    /// Where a depot file lands in the workspace. `None` when the view does
    /// not map it.
    fn where_in_workspace(&self, depot: &DepotPath, workspace: &Workspace) -> Option<WhereMapping>;

    /// Create a new pending changelist with the given description.
    fn create_change_list(&self, description: &str, workspace: &Workspace) -> Option<ChangeSetId>;

    fn open_for_edit(&self, change_list: ChangeSetId, local: &Path, workspace: &Workspace) -> bool;

    /// Open a file for add or edit, whichever its state requires.
    fn reconcile(&self, change_list: ChangeSetId, local: &Path, workspace: &Workspace) -> bool;

    fn mark_deleted(&self, change_list: ChangeSetId, local: &Path, workspace: &Workspace) -> bool;

    /// Bring the whole workspace to head revision.
    fn sync_workspace(&self, workspace: &Workspace) -> Result<()>;

    /// Point the workspace's client at another stream.
    fn switch_stream(&self, stream: &str, workspace: &Workspace) -> bool;

    /// Integrate `from/...` into `to/...`. Returns the command output, which
    /// is empty or says so when there was nothing to integrate.
    fn integrate(
        &self,
        change_list: ChangeSetId,
        from: &str,
        to: &str,
        workspace: &Workspace,
    ) -> Option<String>;

    fn resolve_change_list(
        &self,
        change_list: ChangeSetId,
        flags: &[String],
        workspace: &Workspace,
    ) -> bool;

    fn delete_change_list(&self, change_list: ChangeSetId, workspace: &Workspace) -> bool;
}

/// The default implementation of `P4Operations`, which runs the `p4`
/// command-line client.
#[derive(Debug, Clone)]
pub struct CommandP4 {
    binary: PathBuf,
}

impl Default for CommandP4 {
    fn default() -> Self {
        Self::new(crate::defaults::DEFAULT_P4_BINARY)
    }
}

impl CommandP4 {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, workspace: &Workspace) -> Command {
        let mut command = Command::new(&self.binary);
        command.current_dir(&workspace.root);
        if let Some(client) = &workspace.client {
            command.args(["-c", client]);
        }
        command
    }

    fn render<S: AsRef<OsStr>>(&self, args: &[S]) -> String {
        let mut rendered = self.binary.display().to_string();
        for arg in args {
            rendered.push(' ');
            rendered.push_str(&arg.as_ref().to_string_lossy());
        }
        rendered
    }

    /// Run a command and return its stdout, or an error carrying stderr.
    pub fn run<S: AsRef<OsStr>>(&self, workspace: &Workspace, args: &[S]) -> Result<String> {
        self.run_with_input(workspace, args, None)
    }

    fn run_with_input<S: AsRef<OsStr>>(
        &self,
        workspace: &Workspace,
        args: &[S],
        input: Option<&str>,
    ) -> Result<String> {
        let rendered = self.render(args);
        debug!("Running `{}` in {}", rendered, workspace);

        let tool_error = |stderr: String| Error::ToolCommand {
            command: rendered.clone(),
            workspace: workspace.to_string(),
            stderr,
        };

        let mut command = self.command(workspace);
        command
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| tool_error(e.to_string()))?;
        if let Some(text) = input {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(text.as_bytes())
                    .map_err(|e| tool_error(e.to_string()))?;
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|e| tool_error(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(tool_error(stderr));
        }
        if !stderr.is_empty() {
            debug!("p4 stderr: {}", stderr);
        }
        Ok(stdout)
    }

    /// Like `run`, but folds stderr into the returned text. `p4` reports
    /// several benign conditions ("already integrated", "up-to-date") there.
    fn run_combined<S: AsRef<OsStr>>(&self, workspace: &Workspace, args: &[S]) -> Result<String> {
        let mut command = self.command(workspace);
        let rendered = self.render(args);
        debug!("Running `{}` in {}", rendered, workspace);
        let output = command
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ToolCommand {
                command: rendered.clone(),
                workspace: workspace.to_string(),
                stderr: e.to_string(),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(Error::ToolCommand {
                command: rendered,
                workspace: workspace.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(format!("{}{}", stdout, stderr))
    }

    fn query<S: AsRef<OsStr>>(&self, workspace: &Workspace, args: &[S]) -> Option<String> {
        match self.run(workspace, args) {
            Ok(output) if !output.trim().is_empty() => Some(output),
            Ok(_) => None,
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    fn succeeds<S: AsRef<OsStr>>(&self, workspace: &Workspace, args: &[S]) -> bool {
        match self.run(workspace, args) {
            Ok(_) => true,
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    fn file_op(
        &self,
        op: &str,
        change_list: ChangeSetId,
        extra: &[&str],
        local: &Path,
        workspace: &Workspace,
    ) -> bool {
        let mut args: Vec<OsString> = vec![op.into(), "-c".into(), change_list.to_string().into()];
        args.extend(extra.iter().map(OsString::from));
        args.push(local.as_os_str().to_owned());
        self.succeeds(workspace, &args)
    }
}

impl P4Operations for CommandP4 {
    fn describe(&self, id: ChangeSetId, workspace: &Workspace) -> Option<String> {
        self.query(workspace, &["describe", "-s", &id.to_string()])
    }

    fn describe_full(&self, id: ChangeSetId, workspace: &Workspace) -> Option<String> {
        self.query(workspace, &["describe", &id.to_string()])
    }

    fn recent_submitted(&self, limit: usize, workspace: &Workspace) -> Vec<ChangeSetId> {
        self.query(
            workspace,
            &["changes", "-s", "submitted", "-m", &limit.to_string()],
        )
        .map(|output| parse::parse_changes(&output))
        .unwrap_or_default()
    }

    fn where_in_workspace(&self, depot: &DepotPath, workspace: &Workspace) -> Option<WhereMapping> {
        self.query(workspace, &["-ztag", "where", depot.as_str()])
            .and_then(|output| parse::parse_where_tagged(&output))
    }

    fn create_change_list(&self, description: &str, workspace: &Workspace) -> Option<ChangeSetId> {
        let field = format!("Description={}", description);
        let spec = self.query(workspace, &["--field", field.as_str(), "change", "-o"])?;
        match self.run_with_input(workspace, &["change", "-i"], Some(&spec)) {
            Ok(output) => parse::parse_change_created(&output),
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    fn open_for_edit(&self, change_list: ChangeSetId, local: &Path, workspace: &Workspace) -> bool {
        self.file_op("edit", change_list, &[], local, workspace)
    }

    fn reconcile(&self, change_list: ChangeSetId, local: &Path, workspace: &Workspace) -> bool {
        self.file_op("reconcile", change_list, &["-a", "-e"], local, workspace)
    }

    fn mark_deleted(&self, change_list: ChangeSetId, local: &Path, workspace: &Workspace) -> bool {
        self.file_op("delete", change_list, &[], local, workspace)
    }

    fn sync_workspace(&self, workspace: &Workspace) -> Result<()> {
        self.run_combined(workspace, &["sync", "//..."])
            .map(|_| ())
            .map_err(|e| Error::WorkspaceSync {
                workspace: workspace.to_string(),
                message: e.to_string(),
            })
    }

    fn switch_stream(&self, stream: &str, workspace: &Workspace) -> bool {
        self.succeeds(workspace, &["client", "-s", "-S", stream])
    }

    fn integrate(
        &self,
        change_list: ChangeSetId,
        from: &str,
        to: &str,
        workspace: &Workspace,
    ) -> Option<String> {
        let from = format!("{}/...", from.trim_end_matches('/'));
        let to = format!("{}/...", to.trim_end_matches('/'));
        let cl = change_list.to_string();
        match self.run_combined(workspace, &["integrate", "-c", cl.as_str(), "-i", &from, &to]) {
            Ok(output) => Some(output),
            // p4 exits non-zero when every revision is already integrated.
            Err(Error::ToolCommand { stderr, .. }) if parse::already_integrated(&stderr) => {
                debug!("{}", stderr);
                Some(stderr)
            }
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    fn resolve_change_list(
        &self,
        change_list: ChangeSetId,
        flags: &[String],
        workspace: &Workspace,
    ) -> bool {
        let mut args = vec!["resolve".to_string(), "-c".to_string(), change_list.to_string()];
        args.extend(flags.iter().cloned());
        self.succeeds(workspace, &args)
    }

    fn delete_change_list(&self, change_list: ChangeSetId, workspace: &Workspace) -> bool {
        self.succeeds(workspace, &["change", "-d", &change_list.to_string()])
    }
}
