//! Locating the formatter executable.
//!
//! Lookup order:
//!
//! 1. `prettier_cli_path`, tilde-expanded. It must exist.
//! 2. `node_modules/.bin/prettier` in the file's directory or any parent up
//!    to the project root.
//! 3. `PATH`, with the directory of `node_path` put in front.
//!
//! When `node_path` is set the interpreter is the program and the formatter
//! CLI becomes its first argument.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use prettyfmt_config::Settings;

use crate::FormatError;
use crate::context::FileContext;

const BINARY_NAME: &str = "prettier";

/// A resolved command prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    /// What to spawn.
    pub program: PathBuf,
    /// Arguments placed before the formatter options.
    pub leading_args: Vec<String>,
    /// `PATH` for the child when it had to be extended.
    pub path_env: Option<OsString>,
}

/// Resolve the formatter executable for `file`.
pub fn resolve_executable(settings: &Settings, file: &FileContext) -> Result<Executable, FormatError> {
    let node = non_empty(&settings.node_path).map(expand_tilde);
    let path_env = node
        .as_deref()
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty())
        .and_then(|dir| extend_path(dir, std::env::var_os("PATH")));

    let cli = find_cli(settings, file, path_env.clone())?;
    tracing::debug!(cli = %cli.display(), "Resolved formatter executable");

    Ok(match node {
        Some(node) => Executable {
            program: node,
            leading_args: vec![cli.display().to_string()],
            path_env,
        },
        None => Executable {
            program: cli,
            leading_args: Vec::new(),
            path_env,
        },
    })
}

fn find_cli(
    settings: &Settings,
    file: &FileContext,
    path_env: Option<OsString>,
) -> Result<PathBuf, FormatError> {
    if let Some(explicit) = non_empty(&settings.prettier_cli_path) {
        let path = expand_tilde(explicit);
        if path.exists() {
            return Ok(path);
        }
        return Err(FormatError::ExecutableNotFound {
            hint: format!(
                "prettier_cli_path is set to {} but that file does not exist",
                path.display()
            ),
        });
    }

    let cwd = file.working_dir();
    for dir in file.search_dirs() {
        let bin_dir = dir.join("node_modules").join(".bin");
        if !bin_dir.is_dir() {
            continue;
        }
        if let Ok(found) = which::which_in(BINARY_NAME, Some(&bin_dir), cwd) {
            return Ok(found);
        }
    }

    let search_path = path_env.or_else(|| std::env::var_os("PATH"));
    which::which_in(BINARY_NAME, search_path, cwd).map_err(|_| FormatError::ExecutableNotFound {
        hint: "install it with `npm install --save-dev prettier` in the project, \
               or set prettier_cli_path to its location"
            .to_string(),
    })
}

/// `dir` followed by the entries of `current`.
fn extend_path(dir: &Path, current: Option<OsString>) -> Option<OsString> {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(current) = current {
        paths.extend(std::env::split_paths(&current).filter(|p| p != dir));
    }
    match std::env::join_paths(paths) {
        Ok(joined) => Some(joined),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot add node directory to PATH");
            None
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
            .or_else(|| path.strip_prefix("~\\"))
    };
    match (rest, home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
}
