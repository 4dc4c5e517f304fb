//! Formatter command-line construction.
//!
//! Every option becomes exactly one `--flag=value` token. The argv vector is
//! handed to the OS directly, so a value can never be split into extra
//! arguments or interpreted by a shell.

use std::path::Path;

use prettyfmt_config::Settings;
use prettyfmt_config::defaults::{PRETTIER_OPTION_DEFAULTS, prettier_default};
use serde_json::Value;

/// Where the argument builder found formatter files next to the source file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discovered<'a> {
    /// Nearest formatter config file.
    pub config_file: Option<&'a Path>,
    /// Nearest ignore file.
    pub ignore_file: Option<&'a Path>,
}

/// Build the formatter arguments for `file_path`.
///
/// Order: config handling, options, `--stdin-filepath`, `--ignore-path`, then
/// the user's additional arguments.
pub fn build_args(settings: &Settings, file_path: &Path, discovered: Discovered<'_>) -> Vec<String> {
    let extra = additional_args(settings);
    let has_extra = |flag: &str| extra.iter().any(|(key, _)| key == flag);
    let custom_config = has_extra("--config");

    let mut args = Vec::new();

    let config_in_use = match discovered.config_file {
        Some(config) => {
            if !custom_config {
                args.push(format!("--config={}", config.display()));
                if !has_extra("--config-precedence") {
                    args.push("--config-precedence=cli-override".to_string());
                }
            }
            true
        }
        None => {
            if !custom_config && !has_extra("--no-config") {
                args.push("--no-config".to_string());
            }
            custom_config
        }
    };

    let extension = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let inferred = extension.as_deref().and_then(infer_parser);

    for (name, _) in PRETTIER_OPTION_DEFAULTS {
        if *name == "parser"
            && let Some(parser) = inferred
        {
            args.push(format!("--parser={parser}"));
            continue;
        }
        if config_in_use {
            continue;
        }
        let value = settings
            .prettier_options
            .get(*name)
            .filter(|v| !is_empty_value(v))
            .cloned()
            .or_else(|| prettier_default(name));
        if let Some(value) = value {
            push_option(&mut args, name, &value);
        }
    }

    if !config_in_use {
        for (name, value) in &settings.prettier_options {
            if prettier_default(name).is_some() || is_empty_value(value) {
                continue;
            }
            push_option(&mut args, name, value);
        }
    }

    if !matches!(extension.as_deref(), Some("html" | "htm")) {
        args.push(format!("--stdin-filepath={}", file_path.display()));
    }

    if let Some(ignore) = discovered.ignore_file
        && !has_extra("--ignore-path")
    {
        args.push(format!("--ignore-path={}", ignore.display()));
    }

    args.extend(extra.into_iter().map(|(key, value)| match value {
        Some(value) => format!("{key}={value}"),
        None => key,
    }));

    args
}

/// Parser implied by a file extension, when the extension alone decides it.
pub fn infer_parser(extension: &str) -> Option<&'static str> {
    match extension {
        "css" | "scss" | "less" => Some("css"),
        "ts" | "tsx" | "mts" | "cts" => Some("typescript"),
        "json" | "json5" | "jsonc" => Some("json"),
        "graphql" | "gql" => Some("graphql"),
        "md" | "markdown" => Some("markdown"),
        "mdx" => Some("mdx"),
        "vue" => Some("vue"),
        "html" | "htm" => Some("html"),
        "yaml" | "yml" => Some("yaml"),
        "hbs" | "handlebars" => Some("glimmer"),
        _ => None,
    }
}

/// `printWidth` → `--print-width`.
pub fn flag_name(option: &str) -> String {
    let mut flag = String::with_capacity(option.len() + 4);
    flag.push_str("--");
    for (i, c) in option.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                flag.push('-');
            }
            flag.push(c.to_ascii_lowercase());
        } else if c == '_' {
            flag.push('-');
        } else {
            flag.push(c);
        }
    }
    flag
}

/// Render an option value as a flag argument. Booleans are lowercase.
pub fn value_to_arg(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false") {
                Some(s.to_ascii_lowercase())
            } else {
                Some(s.to_string())
            }
        }
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn push_option(args: &mut Vec<String>, name: &str, value: &Value) {
    let flag = flag_name(name);
    if !is_valid_flag(&flag) {
        tracing::warn!(option = name, "Dropping formatter option with an invalid name");
        return;
    }
    match value_to_arg(value) {
        Some(arg) if arg.contains('\0') => {
            tracing::warn!(option = name, "Dropping formatter option containing a NUL byte");
        }
        Some(arg) => args.push(format!("{flag}={arg}")),
        None => {}
    }
}

/// Validated `additional_cli_args` as `(flag, value)` pairs, in order.
fn additional_args(settings: &Settings) -> Vec<(String, Option<String>)> {
    let mut out = Vec::with_capacity(settings.additional_cli_args.len());
    for (key, value) in &settings.additional_cli_args {
        let key = key.trim();
        if !is_valid_flag(key) {
            tracing::warn!(arg = key, "Dropping additional argument: not a flag");
            continue;
        }
        let value = if is_empty_value(value) {
            None
        } else {
            value_to_arg(value)
        };
        if value.as_deref().is_some_and(|v| v.contains('\0')) {
            tracing::warn!(arg = key, "Dropping additional argument containing a NUL byte");
            continue;
        }
        out.push((key.to_string(), value));
    }
    out
}

fn is_valid_flag(key: &str) -> bool {
    key.starts_with('-')
        && key.len() > 1
        && key != "--"
        && !key.chars().any(|c| c == '=' || c == '\0' || c.is_whitespace())
}
