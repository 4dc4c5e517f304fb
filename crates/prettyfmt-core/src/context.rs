//! Where the buffer being formatted lives on disk.

use std::path::{Path, PathBuf};

/// File path and project root of the buffer being formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    /// Path of the file backing the buffer.
    pub path: PathBuf,
    /// Root of the project the file belongs to, if known.
    pub project_root: Option<PathBuf>,
}

impl FileContext {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            project_root: None,
        }
    }

    /// Builder: set the project root.
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Directory containing the file.
    pub fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Directory the formatter runs in: the project root, else the file's
    /// directory.
    pub fn working_dir(&self) -> &Path {
        self.project_root.as_deref().unwrap_or_else(|| self.dir())
    }

    /// The file's directory and its ancestors, stopping at the project root
    /// when the file is inside it.
    pub fn search_dirs(&self) -> Vec<&Path> {
        let root = self
            .project_root
            .as_deref()
            .filter(|root| self.dir().starts_with(root));
        let mut dirs = Vec::new();
        for dir in self.dir().ancestors() {
            if dir.as_os_str().is_empty() {
                break;
            }
            dirs.push(dir);
            if Some(dir) == root {
                break;
            }
        }
        dirs
    }
}
