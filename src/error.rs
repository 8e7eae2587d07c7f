//! # Error Handling
//!
//! This module defines the centralized error type for `cl-relay`. It uses the
//! `thiserror` library to create an `Error` enum covering the failures that
//! are allowed to abort an operation.
//!
//! Most per-item problems in a relay run are *not* errors: an unknown
//! changelist, an unresolved review, a path that is not mapped in a
//! workspace, or a change-list that could not be created for one category are
//! all reported as data (notes, skips and failures in a
//! [`ReplicationReport`](crate::phases::replicate::ReplicationReport)). The
//! variants below cover the remaining cases:
//!
//! - Configuration parsing and validation.
//! - `p4` invocations that could not be started or exited unsuccessfully.
//! - Workspace synchronization, which is fatal for the caller.
//! - Input list and bundle manifest files.
//! - Filesystem and path operations.
//! - Wrapped I/O, YAML, JSON, regex and glob errors.
//!
//! The `Result` type alias is used to return `Result<T, Error>` from
//! functions throughout the library.

use thiserror::Error;

/// Main error type for cl-relay operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error occurred while parsing or validating the `.cl-relay.yaml`
    /// configuration file.
    ///
    /// This error includes the specific issue and optionally a hint about how
    /// to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A `p4` command could not be run or exited with a failure status.
    #[error("p4 command failed in {workspace}: {command} - {stderr}")]
    ToolCommand {
        command: String,
        workspace: String,
        stderr: String,
    },

    /// A workspace could not be synchronized to head. This aborts a merge.
    #[error("Failed to sync workspace {workspace}: {message}")]
    WorkspaceSync { workspace: String, message: String },

    /// A changelist or depot path list file could not be read.
    #[error("Input list error for {path}: {message}")]
    InputList { path: String, message: String },

    /// An asset bundle manifest does not have the expected shape.
    #[error("Manifest error: {message}")]
    Manifest { message: String },

    /// An error occurred while touching workspace files.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An error occurred with a path-related operation.
    #[error("Path operation error: {message}")]
    Path { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
