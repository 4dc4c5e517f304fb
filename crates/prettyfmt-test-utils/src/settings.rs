//! Settings builders for tests.
//!
//! [`TestSettingsBuilder`] fills the project layer by default, which is what
//! most tests want: the highest-precedence source wins, and defaults come
//! from the built-in table.

use std::path::Path;
use std::sync::Arc;

use prettyfmt_config::{LayerKind, OptionLayer, Settings, SettingsCache, merge};
use serde_json::{Map, Value};

/// Fluent builder for settings layers.
///
/// ```ignore
/// let cache = TestSettingsBuilder::new()
///     .prettier_cli_path(project.fake_cli())
///     .prettier_option("singleQuote", true)
///     .build_cache();
/// ```
pub struct TestSettingsBuilder {
    default: OptionLayer,
    user: OptionLayer,
    project: OptionLayer,
    prettier_options: Map<String, Value>,
    additional_cli_args: Map<String, Value>,
}

impl TestSettingsBuilder {
    pub fn new() -> Self {
        Self {
            default: OptionLayer::empty(LayerKind::Default),
            user: OptionLayer::empty(LayerKind::User),
            project: OptionLayer::empty(LayerKind::Project),
            prettier_options: Map::new(),
            additional_cli_args: Map::new(),
        }
    }

    /// Set a top-level key in the project layer.
    pub fn project(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.project = self.project.with(key, value);
        self
    }

    /// Set a top-level key in the user layer.
    pub fn user(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.user = self.user.with(key, value);
        self
    }

    /// Set a top-level key in the default layer.
    pub fn default_layer(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.default = self.default.with(key, value);
        self
    }

    pub fn debug(self, enabled: bool) -> Self {
        self.project("debug", enabled)
    }

    pub fn prettier_cli_path(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().display().to_string();
        self.project("prettier_cli_path", path)
    }

    pub fn node_path(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().display().to_string();
        self.project("node_path", path)
    }

    pub fn auto_format_on_save(self, enabled: bool) -> Self {
        self.project("auto_format_on_save", enabled)
    }

    pub fn auto_format_on_save_excludes(self, patterns: &[&str]) -> Self {
        self.project("auto_format_on_save_excludes", strings(patterns))
    }

    pub fn requires_prettier_config(self, enabled: bool) -> Self {
        self.project("auto_format_on_save_requires_prettier_config", enabled)
    }

    pub fn allow_inline_formatting(self, enabled: bool) -> Self {
        self.project("allow_inline_formatting", enabled)
    }

    pub fn custom_file_extensions(self, extensions: &[&str]) -> Self {
        self.project("custom_file_extensions", strings(extensions))
    }

    pub fn max_file_size_limit(self, bytes: i64) -> Self {
        self.project("max_file_size_limit", bytes)
    }

    pub fn timeout_seconds(self, seconds: u64) -> Self {
        self.project("timeout_seconds", seconds)
    }

    /// Set one formatter option in the project layer.
    pub fn prettier_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.prettier_options.insert(name.to_string(), value.into());
        self
    }

    /// Append one additional command-line argument in the project layer.
    pub fn additional_cli_arg(mut self, flag: &str, value: impl Into<Value>) -> Self {
        self.additional_cli_args.insert(flag.to_string(), value.into());
        self
    }

    /// The three layers in precedence order.
    pub fn build_layers(self) -> (OptionLayer, OptionLayer, OptionLayer) {
        let mut project = self.project;
        if !self.prettier_options.is_empty() {
            project = project.with("prettier_options", Value::Object(self.prettier_options));
        }
        if !self.additional_cli_args.is_empty() {
            project = project.with("additional_cli_args", Value::Object(self.additional_cli_args));
        }
        (self.default, self.user, project)
    }

    pub fn build_cache(self) -> Arc<SettingsCache> {
        let (default, user, project) = self.build_layers();
        Arc::new(SettingsCache::new(default, user, project))
    }

    pub fn build(self) -> Settings {
        let (default, user, project) = self.build_layers();
        Settings::from_options(&merge(&default, &user, &project))
    }
}

impl Default for TestSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::String(s.to_string())).collect())
}
