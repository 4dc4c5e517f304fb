//! Settings layers.
//!
//! Each layer is an ordered map from setting name to JSON value. Layers are
//! read from JSON (`.json`, `.sublime-settings`) or TOML (`.toml`) files;
//! both formats produce the same shape.
//!
//! ## TOML Example
//!
//! ```toml
//! auto_format_on_save = true
//! auto_format_on_save_excludes = ["node_modules/**", "*.min.js"]
//! max_file_size_limit = 200000
//!
//! [prettier_options]
//! printWidth = 100
//! singleQuote = true
//!
//! [additional_cli_args]
//! "--log-level" = "warn"
//! ```

use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use crate::{ConfigError, ValueKind};

/// Which configuration source a layer came from, in increasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    /// Package defaults shipped alongside the integration.
    Default,
    /// The user's global settings.
    User,
    /// Settings of the project the file belongs to.
    Project,
}

impl LayerKind {
    /// All layers, lowest precedence first.
    pub const ALL: [LayerKind; 3] = [LayerKind::Default, LayerKind::User, LayerKind::Project];
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKind::Default => write!(f, "default"),
            LayerKind::User => write!(f, "user"),
            LayerKind::Project => write!(f, "project"),
        }
    }
}

/// On-disk format of a layer file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayerFormat {
    Json,
    Toml,
}

impl LayerFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") | Some("sublime-settings") => Ok(LayerFormat::Json),
            Some("toml") => Ok(LayerFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// One named configuration source.
///
/// Immutable once loaded; replacing a layer means building a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionLayer {
    kind: LayerKind,
    values: Map<String, Value>,
}

impl OptionLayer {
    /// Create an empty layer.
    pub fn empty(kind: LayerKind) -> Self {
        Self {
            kind,
            values: Map::new(),
        }
    }

    /// Wrap an existing map.
    pub fn from_map(kind: LayerKind, values: Map<String, Value>) -> Self {
        Self { kind, values }
    }

    /// Build a layer from any JSON value; the value must be an object.
    pub fn from_value(kind: LayerKind, value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(values) => Ok(Self { kind, values }),
            other => Err(ConfigError::NotAnObject(ValueKind::of(&other))),
        }
    }

    /// Parse a layer from JSON text.
    pub fn parse_json(kind: LayerKind, s: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_value(kind, value)
    }

    /// Parse a layer from TOML text.
    pub fn parse_toml(kind: LayerKind, s: &str) -> Result<Self, ConfigError> {
        let value: Value = toml::from_str(s)?;
        Self::from_value(kind, value)
    }

    /// Load a layer from a file using async I/O. The format is picked from
    /// the file extension.
    pub async fn load(kind: LayerKind, path: &Path) -> Result<Self, ConfigError> {
        let format = LayerFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path).await?;
        let layer = match format {
            LayerFormat::Json => Self::parse_json(kind, &content)?,
            LayerFormat::Toml => Self::parse_toml(kind, &content)?,
        };
        tracing::debug!(
            layer = %kind,
            path = %path.display(),
            keys = layer.len(),
            "Loaded settings layer"
        );
        Ok(layer)
    }

    /// Builder: set a value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// The source of this layer.
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Look up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Iterate over entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// The underlying map.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
