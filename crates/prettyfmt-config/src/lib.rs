#![deny(unsafe_code)]

//! Settings layers and option merging for prettyfmt.
//!
//! Settings come from three [`OptionLayer`]s (default, user, project) that
//! share one schema. [`merge`] folds them into [`EffectiveOptions`] on top of
//! the built-in defaults, [`Settings`] is the typed view the formatter core
//! reads, and [`SettingsCache`] keeps the merged result until a layer
//! changes.

/// Caching of merged settings with invalidation on layer replacement.
pub mod cache;
/// Built-in defaults for every recognised key.
pub mod defaults;
/// Settings layers and their on-disk formats.
pub mod layer;
/// Layered option merging.
pub mod merge;
/// Typed view over the effective options.
pub mod settings;

use std::fmt;

use serde_json::Value;

pub use cache::{ResolvedSettings, SettingsCache};
pub use layer::{LayerKind, OptionLayer};
pub use merge::{EffectiveOptions, MergeReport, merge, merge_with_report};
pub use settings::Settings;

/// Errors that can occur while loading or merging settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported settings file format: {0}")]
    UnsupportedFormat(String),

    #[error("settings root must be an object, got {0}")]
    NotAnObject(ValueKind),

    #[error("{layer} setting {key:?} expects {expected}, got {found}; override ignored")]
    TypeMismatch {
        layer: LayerKind,
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("validation error: {0}")]
    Validation(String),
}

/// The JSON type of a setting value, used for per-key type checks.
///
/// [`ValueKind::of`] only yields the six plain JSON kinds. The narrower
/// kinds describe what some built-in settings require on top of that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    /// A number without a fractional part that fits in an `i64`.
    Integer,
    /// An integer that is zero or greater.
    NonNegativeInteger,
    /// An array whose elements are all strings.
    StringArray,
}

impl ValueKind {
    /// Classify a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Whether `value` satisfies this kind.
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ValueKind::Integer => value.as_i64().is_some(),
            ValueKind::NonNegativeInteger => value.as_u64().is_some(),
            ValueKind::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            kind => ValueKind::of(value) == kind,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "a boolean",
            ValueKind::Number => "a number",
            ValueKind::String => "a string",
            ValueKind::Array => "an array",
            ValueKind::Object => "an object",
            ValueKind::Integer => "an integer",
            ValueKind::NonNegativeInteger => "a non-negative integer",
            ValueKind::StringArray => "an array of strings",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_value_kind_classification() {
        assert_eq!(ValueKind::of(&json!(null)), ValueKind::Null);
        assert_eq!(ValueKind::of(&json!(true)), ValueKind::Bool);
        assert_eq!(ValueKind::of(&json!(1)), ValueKind::Number);
        assert_eq!(ValueKind::of(&json!(1.5)), ValueKind::Number);
        assert_eq!(ValueKind::of(&json!("x")), ValueKind::String);
        assert_eq!(ValueKind::of(&json!([])), ValueKind::Array);
        assert_eq!(ValueKind::of(&json!({})), ValueKind::Object);
    }

    #[test]
    fn test_narrow_kinds() {
        assert!(ValueKind::Integer.accepts(&json!(-20)));
        assert!(!ValueKind::Integer.accepts(&json!(500.5)));
        assert!(!ValueKind::Integer.accepts(&json!("500")));
        assert!(ValueKind::NonNegativeInteger.accepts(&json!(0)));
        assert!(!ValueKind::NonNegativeInteger.accepts(&json!(-5)));
        assert!(ValueKind::StringArray.accepts(&json!(["svelte"])));
        assert!(ValueKind::StringArray.accepts(&json!([])));
        assert!(!ValueKind::StringArray.accepts(&json!(["svelte", 1])));
        assert!(ValueKind::Bool.accepts(&json!(true)));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::TypeMismatch {
            layer: LayerKind::User,
            key: "debug".to_string(),
            expected: ValueKind::Bool,
            found: ValueKind::String,
        };
        assert_eq!(
            err.to_string(),
            "user setting \"debug\" expects a boolean, got a string; override ignored"
        );

        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
