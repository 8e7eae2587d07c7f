//! Default values for cl-relay configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::{Path, PathBuf};

/// Configuration file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".cl-relay.yaml";

/// Perforce command-line client.
pub const DEFAULT_P4_BINARY: &str = "p4";

/// Description given to change-lists created by a merge.
pub const DEFAULT_DESCRIPTION: &str = "Auto merge files from Source to Target based on CLs";

/// How many recent submitted changelists are scanned for a review's
/// submitted counterpart.
pub const DEFAULT_REVIEW_SCAN_LIMIT: usize = 100;

/// Changelist file read by `merge` when none is given.
pub const DEFAULT_CHANGELIST_FILE: &str = "changelists.txt";

/// Flags passed to `p4 resolve` after a stream integration: accept merged
/// results, ignore whitespace differences.
pub fn default_resolve_flags() -> Vec<String> {
    vec!["-am".to_string(), "-dw".to_string()]
}

/// Returns the per-user configuration file.
///
/// Uses the platform-appropriate config directory:
/// - Linux: `~/.config/cl-relay/config.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/cl-relay/config.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\cl-relay\config.yaml`
pub fn user_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cl-relay").join("config.yaml"))
}

/// Pick the configuration file to load.
///
/// An explicit path (from `--config` or `CL_RELAY_CONFIG`) always wins.
/// Otherwise `.cl-relay.yaml` in `cwd` is used, falling back to the per-user
/// file when only that one exists.
pub fn resolve_config_path(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = cwd.join(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }
    match user_config_file() {
        Some(user) if user.exists() => user,
        _ => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_user_config_file_location() {
        if let Some(path) = user_config_file() {
            assert!(path.ends_with("cl-relay/config.yaml"));
        }
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(DEFAULT_CONFIG_FILE), "targets: []").unwrap();
        let explicit = Path::new("/etc/cl-relay.yaml");
        assert_eq!(
            resolve_config_path(Some(explicit), temp.path()),
            PathBuf::from("/etc/cl-relay.yaml")
        );
    }

    #[test]
    fn test_local_config_path() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(DEFAULT_CONFIG_FILE), "targets: []").unwrap();
        assert_eq!(
            resolve_config_path(None, temp.path()),
            temp.path().join(DEFAULT_CONFIG_FILE)
        );
    }

    #[test]
    fn test_resolve_flags() {
        assert_eq!(default_resolve_flags(), vec!["-am", "-dw"]);
    }
}
