//! Built-in defaults.
//!
//! These values sit below the default layer, so a key that no layer
//! mentions still resolves to something sensible. They also define the
//! reference type for each recognised key during merging.

use serde_json::{Map, Value, json};

use crate::ValueKind;

/// Default process timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// `max_file_size_limit` value meaning "no limit".
pub const UNLIMITED_FILE_SIZE: i64 = -1;

/// Formatter options and their defaults, in the order they are passed to
/// the formatter.
pub const PRETTIER_OPTION_DEFAULTS: &[(&str, PrettierDefault)] = &[
    ("printWidth", PrettierDefault::Int(80)),
    ("tabWidth", PrettierDefault::Int(2)),
    ("useTabs", PrettierDefault::Bool(false)),
    ("singleQuote", PrettierDefault::Bool(false)),
    ("trailingComma", PrettierDefault::Str("none")),
    ("bracketSpacing", PrettierDefault::Bool(true)),
    ("jsxBracketSameLine", PrettierDefault::Bool(false)),
    ("parser", PrettierDefault::Str("babel")),
    ("semi", PrettierDefault::Bool(true)),
    ("requirePragma", PrettierDefault::Bool(false)),
    ("proseWrap", PrettierDefault::Str("preserve")),
    ("arrowParens", PrettierDefault::Str("avoid")),
    ("insertPragma", PrettierDefault::Bool(false)),
];

/// A constant default value for a formatter option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrettierDefault {
    Int(i64),
    Bool(bool),
    Str(&'static str),
}

impl PrettierDefault {
    /// Convert to a JSON value.
    pub fn to_value(self) -> Value {
        match self {
            PrettierDefault::Int(n) => json!(n),
            PrettierDefault::Bool(b) => json!(b),
            PrettierDefault::Str(s) => json!(s),
        }
    }
}

/// Look up the built-in default of a formatter option.
pub fn prettier_default(option: &str) -> Option<Value> {
    PRETTIER_OPTION_DEFAULTS
        .iter()
        .find(|(name, _)| *name == option)
        .map(|(_, default)| default.to_value())
}

/// Stricter shape required of a built-in setting beyond its JSON type.
pub fn value_constraint(key: &str) -> Option<ValueKind> {
    match key {
        "max_file_size_limit" => Some(ValueKind::Integer),
        "timeout_seconds" => Some(ValueKind::NonNegativeInteger),
        "auto_format_on_save_excludes" | "custom_file_extensions" => Some(ValueKind::StringArray),
        _ => None,
    }
}

/// The built-in option set.
pub fn builtin_options() -> Map<String, Value> {
    let prettier_options: Map<String, Value> = PRETTIER_OPTION_DEFAULTS
        .iter()
        .map(|(name, default)| ((*name).to_string(), default.to_value()))
        .collect();

    let value = json!({
        "debug": false,
        "prettier_cli_path": "",
        "node_path": "",
        "auto_format_on_save": false,
        "auto_format_on_save_excludes": [],
        "auto_format_on_save_requires_prettier_config": false,
        "allow_inline_formatting": false,
        "custom_file_extensions": [],
        "max_file_size_limit": UNLIMITED_FILE_SIZE,
        "timeout_seconds": DEFAULT_TIMEOUT_SECS,
        "additional_cli_args": {},
        "prettier_options": prettier_options,
    });

    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_contains_every_key() {
        let builtin = builtin_options();
        for key in [
            "debug",
            "prettier_cli_path",
            "node_path",
            "auto_format_on_save",
            "auto_format_on_save_excludes",
            "auto_format_on_save_requires_prettier_config",
            "allow_inline_formatting",
            "custom_file_extensions",
            "max_file_size_limit",
            "timeout_seconds",
            "additional_cli_args",
            "prettier_options",
        ] {
            assert!(builtin.contains_key(key), "missing built-in key {key}");
        }
    }

    #[test]
    fn test_builtin_values_meet_their_constraints() {
        for (key, value) in builtin_options() {
            if let Some(kind) = value_constraint(&key) {
                assert!(kind.accepts(&value), "built-in {key} is not {kind}");
            }
        }
    }

    #[test]
    fn test_prettier_defaults_are_ordered() {
        let builtin = builtin_options();
        let options = builtin["prettier_options"].as_object().unwrap();
        let keys: Vec<&str> = options.keys().map(String::as_str).collect();
        assert_eq!(keys.first(), Some(&"printWidth"));
        assert_eq!(keys.last(), Some(&"insertPragma"));
        assert_eq!(options["printWidth"], json!(80));
        assert_eq!(options["parser"], json!("babel"));
    }

    #[test]
    fn test_prettier_default_lookup() {
        assert_eq!(prettier_default("semi"), Some(json!(true)));
        assert_eq!(prettier_default("trailingComma"), Some(json!("none")));
        assert_eq!(prettier_default("endOfLine"), None);
    }
}
