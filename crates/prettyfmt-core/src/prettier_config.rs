//! Formatter config and ignore-file discovery.
//!
//! Both searches walk from the file's directory up to the project root and
//! take the nearest match.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::context::FileContext;

/// Config file names recognised in each directory, in lookup order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".prettierrc",
    ".prettierrc.json",
    ".prettierrc.yaml",
    ".prettierrc.yml",
    ".prettierrc.json5",
    ".prettierrc.js",
    ".prettierrc.cjs",
    ".prettierrc.mjs",
    ".prettierrc.toml",
    "prettier.config.js",
    "prettier.config.cjs",
    "prettier.config.mjs",
];

/// Name of the ignore file.
pub const IGNORE_FILE_NAME: &str = ".prettierignore";

/// Find the nearest formatter config for the file, including a
/// `package.json` with a `"prettier"` key.
pub fn find_config(file: &FileContext) -> Option<PathBuf> {
    for dir in file.search_dirs() {
        if let Some(found) = CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
        {
            tracing::debug!(path = %found.display(), "Found formatter config");
            return Some(found);
        }
        let package_json = dir.join("package.json");
        if package_json_has_config(&package_json) {
            tracing::debug!(path = %package_json.display(), "Found formatter config in package.json");
            return Some(package_json);
        }
    }
    None
}

/// Find the nearest ignore file for the file.
pub fn find_ignore_file(file: &FileContext) -> Option<PathBuf> {
    file.search_dirs()
        .into_iter()
        .map(|dir| dir.join(IGNORE_FILE_NAME))
        .find(|path| path.is_file())
}

fn package_json_has_config(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    serde_json::from_str::<Value>(&content)
        .ok()
        .is_some_and(|v| v.get("prettier").is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/nested")).unwrap();
        tmp
    }

    #[test]
    fn test_finds_nearest_config() {
        let tmp = project();
        std::fs::write(tmp.path().join(".prettierrc"), "{}").unwrap();
        std::fs::write(tmp.path().join("src/.prettierrc.json"), "{}").unwrap();

        let file = FileContext::new(tmp.path().join("src/nested/a.js"))
            .with_project_root(tmp.path());
        assert_eq!(find_config(&file), Some(tmp.path().join("src/.prettierrc.json")));
    }

    #[test]
    fn test_package_json_with_prettier_key() {
        let tmp = project();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{"name": "x", "prettier": {"semi": false}}"#,
        )
        .unwrap();
        let file = FileContext::new(tmp.path().join("src/a.js")).with_project_root(tmp.path());
        assert_eq!(find_config(&file), Some(tmp.path().join("package.json")));
    }

    #[test]
    fn test_package_json_without_key_is_skipped() {
        let tmp = project();
        std::fs::write(tmp.path().join("package.json"), r#"{"name": "x"}"#).unwrap();
        let file = FileContext::new(tmp.path().join("src/a.js")).with_project_root(tmp.path());
        assert_eq!(find_config(&file), None);
    }

    #[test]
    fn test_search_stops_at_project_root() {
        let tmp = project();
        std::fs::write(tmp.path().join(".prettierrc"), "{}").unwrap();
        let file = FileContext::new(tmp.path().join("src/nested/a.js"))
            .with_project_root(tmp.path().join("src"));
        assert_eq!(find_config(&file), None);
    }

    #[test]
    fn test_finds_ignore_file() {
        let tmp = project();
        std::fs::write(tmp.path().join(IGNORE_FILE_NAME), "dist\n").unwrap();
        let file = FileContext::new(tmp.path().join("src/nested/a.js"))
            .with_project_root(tmp.path());
        assert_eq!(find_ignore_file(&file), Some(tmp.path().join(IGNORE_FILE_NAME)));
    }
}
