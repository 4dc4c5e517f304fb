//! Temporary project directories.

use std::path::{Path, PathBuf};

use prettyfmt_core::FileContext;
use tempfile::TempDir;

/// Name of the placeholder formatter CLI created by [`TestProject::fake_cli`].
pub const FAKE_CLI_NAME: &str = "prettier-cli.js";

/// A project root in a temporary directory, removed on drop.
///
/// ```ignore
/// let project = TestProject::new();
/// project.write(".prettierrc", "{}");
/// let file = project.file_context("src/a.js");
/// ```
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp project"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a project-relative file.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create directories");
        }
        std::fs::write(&path, content).expect("failed to write test file");
        path
    }

    /// Create an (empty) formatter CLI file so explicit-path resolution
    /// succeeds. The scripted runner never executes it.
    pub fn fake_cli(&self) -> PathBuf {
        self.write(FAKE_CLI_NAME, "")
    }

    /// A file context for `relative` with this project as root.
    pub fn file_context(&self, relative: &str) -> FileContext {
        FileContext::new(self.path(relative)).with_project_root(self.root())
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
