//! Typed view over [`EffectiveOptions`].
//!
//! The merger already rejects overrides of the wrong type or shape, so
//! conversion normally succeeds. A value that still does not deserialize is
//! logged and replaced by its built-in default.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults::{DEFAULT_TIMEOUT_SECS, UNLIMITED_FILE_SIZE, builtin_options};
use crate::merge::EffectiveOptions;

/// The settings the formatter core acts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Log command lines and skipped files at `info` instead of `debug`.
    pub debug: bool,

    /// Explicit path to the formatter CLI. Empty means auto-resolve.
    pub prettier_cli_path: String,

    /// Interpreter used to run the formatter CLI. Empty means run the CLI
    /// directly.
    pub node_path: String,

    /// Format whole files when they are saved.
    pub auto_format_on_save: bool,

    /// Glob patterns of files never formatted on save.
    pub auto_format_on_save_excludes: Vec<String>,

    /// Only format on save when a formatter config file can be found.
    pub auto_format_on_save_requires_prettier_config: bool,

    /// Format selections instead of the whole file when any exist.
    pub allow_inline_formatting: bool,

    /// Extra file extensions to treat as formattable.
    pub custom_file_extensions: Vec<String>,

    /// Maximum file size in bytes; negative disables the check.
    pub max_file_size_limit: i64,

    /// Seconds to wait for the formatter; `0` waits forever.
    pub timeout_seconds: u64,

    /// Arguments appended verbatim to the formatter command line.
    pub additional_cli_args: Map<String, Value>,

    /// Formatter options serialized as command-line flags.
    pub prettier_options: Map<String, Value>,
}

impl Settings {
    /// Build the typed view, falling back to built-in defaults per field.
    pub fn from_options(options: &EffectiveOptions) -> Self {
        let fallback = Self::default();
        Self {
            debug: field(options, "debug", fallback.debug),
            prettier_cli_path: field(options, "prettier_cli_path", fallback.prettier_cli_path),
            node_path: field(options, "node_path", fallback.node_path),
            auto_format_on_save: field(options, "auto_format_on_save", fallback.auto_format_on_save),
            auto_format_on_save_excludes: field(
                options,
                "auto_format_on_save_excludes",
                fallback.auto_format_on_save_excludes,
            ),
            auto_format_on_save_requires_prettier_config: field(
                options,
                "auto_format_on_save_requires_prettier_config",
                fallback.auto_format_on_save_requires_prettier_config,
            ),
            allow_inline_formatting: field(
                options,
                "allow_inline_formatting",
                fallback.allow_inline_formatting,
            ),
            custom_file_extensions: field(
                options,
                "custom_file_extensions",
                fallback.custom_file_extensions,
            ),
            max_file_size_limit: field(options, "max_file_size_limit", fallback.max_file_size_limit),
            timeout_seconds: field(options, "timeout_seconds", fallback.timeout_seconds),
            additional_cli_args: field(options, "additional_cli_args", fallback.additional_cli_args),
            prettier_options: field(options, "prettier_options", fallback.prettier_options),
        }
    }

    /// The size limit in bytes, or `None` when unlimited.
    pub fn file_size_limit(&self) -> Option<u64> {
        u64::try_from(self.max_file_size_limit).ok()
    }

    /// The formatter timeout, or `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }
}

impl Default for Settings {
    fn default() -> Self {
        let builtin = builtin_options();
        let object = |key: &str| {
            builtin
                .get(key)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        };
        Self {
            debug: false,
            prettier_cli_path: String::new(),
            node_path: String::new(),
            auto_format_on_save: false,
            auto_format_on_save_excludes: Vec::new(),
            auto_format_on_save_requires_prettier_config: false,
            allow_inline_formatting: false,
            custom_file_extensions: Vec::new(),
            max_file_size_limit: UNLIMITED_FILE_SIZE,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            additional_cli_args: object("additional_cli_args"),
            prettier_options: object("prettier_options"),
        }
    }
}

fn field<T: DeserializeOwned>(options: &EffectiveOptions, key: &str, fallback: T) -> T {
    let Some(value) = options.get(key) else {
        return fallback;
    };
    match T::deserialize(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed setting, using default");
            fallback
        }
    }
}
