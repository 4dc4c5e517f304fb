//! Pre-invocation gate.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! | # | Rule | Reason |
//! |---|------|--------|
//! | 1 | `max_file_size_limit >= 0` and size exceeds it | `size` |
//! | 2 | extension not built-in and not in `custom_file_extensions` | `extension` |
//! | 3 | save-triggered and path matches `auto_format_on_save_excludes` | `excluded` |
//!
//! The check is pure: the same inputs always give the same decision.

use std::fmt;
use std::path::{Component, Path};

use globset::Glob;
use prettyfmt_config::Settings;

/// Extensions formatted without any configuration.
pub const BUILTIN_EXTENSIONS: &[&str] = &[
    "js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts", "css", "scss", "less", "json", "json5",
    "jsonc", "graphql", "gql", "md", "markdown", "mdx", "vue", "html", "htm", "yaml", "yml", "hbs",
    "handlebars",
];

/// What started a format action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The user ran the format command.
    Manual,
    /// The buffer is about to be saved.
    Save,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Manual => write!(f, "manual"),
            Trigger::Save => write!(f, "save"),
        }
    }
}

/// Why a file was not formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The file is larger than `max_file_size_limit`.
    Size { size: u64, limit: u64 },
    /// The extension is not recognised.
    Extension { extension: Option<String> },
    /// A save-time exclusion pattern matched.
    Excluded { pattern: String },
}

impl Rejection {
    /// Short reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::Size { .. } => "size",
            Rejection::Extension { .. } => "extension",
            Rejection::Excluded { .. } => "excluded",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Size { size, limit } => {
                write!(f, "file is {size} bytes, limit is {limit}")
            }
            Rejection::Extension { extension: Some(ext) } => {
                write!(f, "extension {ext:?} is not formattable")
            }
            Rejection::Extension { extension: None } => write!(f, "file has no extension"),
            Rejection::Excluded { pattern } => {
                write!(f, "excluded from format on save by {pattern:?}")
            }
        }
    }
}

/// The gate's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EligibilityDecision {
    Eligible,
    Ineligible(Rejection),
}

impl EligibilityDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, EligibilityDecision::Eligible)
    }

    /// Reason code, `None` when eligible.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            EligibilityDecision::Eligible => None,
            EligibilityDecision::Ineligible(rejection) => Some(rejection.code()),
        }
    }
}

/// Decide whether a file should be formatted.
pub fn check(
    file_path: &Path,
    file_size_bytes: u64,
    trigger: Trigger,
    settings: &Settings,
) -> EligibilityDecision {
    if let Some(limit) = settings.file_size_limit()
        && file_size_bytes > limit
    {
        return EligibilityDecision::Ineligible(Rejection::Size {
            size: file_size_bytes,
            limit,
        });
    }

    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if !extension
        .as_deref()
        .is_some_and(|ext| is_recognized_extension(ext, &settings.custom_file_extensions))
    {
        return EligibilityDecision::Ineligible(Rejection::Extension { extension });
    }

    if trigger == Trigger::Save
        && let Some(pattern) = matching_exclude(file_path, &settings.auto_format_on_save_excludes)
    {
        return EligibilityDecision::Ineligible(Rejection::Excluded {
            pattern: pattern.to_string(),
        });
    }

    EligibilityDecision::Eligible
}

/// Whether `extension` (lowercase, no dot) is built-in or listed in
/// `custom`. Custom entries may carry a leading dot and any case.
pub fn is_recognized_extension(extension: &str, custom: &[String]) -> bool {
    BUILTIN_EXTENSIONS.contains(&extension)
        || custom.iter().any(|c| {
            c.trim()
                .trim_start_matches('.')
                .eq_ignore_ascii_case(extension)
        })
}

/// Return the first exclusion pattern matching the path.
///
/// A pattern matches when it matches the whole path or any trailing run of
/// its components, so `node_modules/**` excludes `/repo/node_modules/a.js`.
pub fn matching_exclude<'a>(file_path: &Path, patterns: &'a [String]) -> Option<&'a str> {
    let candidates = path_suffixes(file_path);
    patterns.iter().map(String::as_str).find(|pattern| {
        let matcher = match Glob::new(pattern) {
            Ok(glob) => glob.compile_matcher(),
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Ignoring invalid exclusion pattern");
                return false;
            }
        };
        candidates.iter().any(|candidate| matcher.is_match(candidate))
    })
}

/// The full path followed by each shorter trailing run of components,
/// all with `/` separators.
fn path_suffixes(path: &Path) -> Vec<String> {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let absolute = path.has_root();

    let mut suffixes = Vec::with_capacity(parts.len() + 1);
    let full = parts.join("/");
    if absolute {
        suffixes.push(format!("/{full}"));
    }
    suffixes.push(full);
    for i in 1..parts.len() {
        suffixes.push(parts[i..].join("/"));
    }
    suffixes
}
