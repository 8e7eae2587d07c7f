//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and configuration snippets to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config(configs::SINGLE_TARGET);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Common configuration YAML snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// One target; workspace roots are relative placeholders replaced by
    /// [`super::TestFixture::with_workspaces_config`].
    pub const SINGLE_TARGET: &str = r#"
targets:
  - category: CLIENT
    source: { root: "{SOURCE}" }
    target: { root: "{TARGET}" }
"#;

    /// A default target plus a pattern-routed Lua target.
    pub const TWO_TARGETS: &str = r#"
description: Auto merge files from Source to Target based on CLs
source: { root: "{SOURCE}" }
targets:
  - category: CLIENT
    default: true
    source: { root: "{SOURCE}" }
    target: { root: "{TARGET}" }
  - category: COMBAT_LUA
    patterns: ["//depot/**/combat_lua/**"]
    source: { root: "{SOURCE}" }
    target: { root: "{TARGET_LUA}" }
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "targets: [ { category: ";

    /// Valid YAML that fails validation.
    pub const NO_TARGETS: &str = "targets: []\n";
}

/// A test fixture that provides a temporary directory with optional config.
///
/// This struct simplifies the common pattern of creating a temp directory
/// and populating it with a `.cl-relay.yaml` configuration file.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_config(configs::NO_TARGETS)
///     .with_file("changelists.txt", "12345\n");
///
/// let mut cmd = cargo_bin_cmd!("cl-relay");
/// cmd.current_dir(fixture.path())
///     .arg("validate")
///     .assert()
///     .failure();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `.cl-relay.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file(".cl-relay.yaml", content)
    }

    /// Add a configuration whose `{SOURCE}`, `{TARGET}` and `{TARGET_LUA}`
    /// placeholders point at `source/`, `target/` and `target_lua/` inside
    /// the fixture. The directories are created.
    pub fn with_workspaces_config(self, template: &str) -> Self {
        let mut content = template.to_string();
        for (placeholder, dir) in [
            ("{TARGET_LUA}", "target_lua"),
            ("{SOURCE}", "source"),
            ("{TARGET}", "target"),
        ] {
            let root = self.temp_dir.child(dir);
            root.create_dir_all().expect("Failed to create workspace root");
            content = content.replace(placeholder, &yaml_path(root.path()));
        }
        self.with_config(&content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the configuration file.
    pub fn config_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join(".cl-relay.yaml")
    }

    /// Get a child path within the temporary directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward slashes keep Windows paths valid inside double-quoted YAML.
fn yaml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
