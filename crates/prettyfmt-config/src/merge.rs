//! Layered option merging.
//!
//! Layers apply in increasing precedence on top of the built-in defaults:
//! built-in < default < user < project. Merging is pure and never fails.
//! A bad field in one layer only costs that field.
//!
//! Built-in settings with a narrower shape (integer sizes, non-negative
//! timeouts, string lists) reject overrides that have the right JSON type
//! but the wrong shape, so the lower layer's value survives.
//!
//! Objects one level deep (`prettier_options`, `additional_cli_args`) merge
//! key by key under the same rule. Anything deeper is replaced wholesale.

use serde_json::{Map, Value};

use crate::defaults::{builtin_options, value_constraint};
use crate::layer::{LayerKind, OptionLayer};
use crate::{ConfigError, ValueKind};

/// The merged option set for one file context.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveOptions {
    values: Map<String, Value>,
}

impl EffectiveOptions {
    /// The built-in defaults with no layers applied.
    pub fn builtin() -> Self {
        Self {
            values: builtin_options(),
        }
    }

    /// Look up a top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Look up a value inside a top-level object, e.g.
    /// `nested("prettier_options", "printWidth")`.
    pub fn nested(&self, key: &str, inner: &str) -> Option<&Value> {
        self.values.get(key)?.as_object()?.get(inner)
    }

    /// The merged map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consume into the merged map.
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

impl Default for EffectiveOptions {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Merge result plus the per-key problems that were skipped.
#[derive(Debug)]
pub struct MergeReport {
    pub options: EffectiveOptions,
    pub warnings: Vec<ConfigError>,
}

/// Merge the three layers into the effective option set.
///
/// Rejected overrides are logged at `warn` level.
pub fn merge(default: &OptionLayer, user: &OptionLayer, project: &OptionLayer) -> EffectiveOptions {
    merge_with_report(default, user, project).options
}

/// Like [`merge`] but also returns the rejected overrides.
pub fn merge_with_report(
    default: &OptionLayer,
    user: &OptionLayer,
    project: &OptionLayer,
) -> MergeReport {
    let builtin = builtin_options();
    let mut merged = builtin.clone();
    let mut warnings = Vec::new();

    for layer in [default, user, project] {
        for (key, value) in layer.iter() {
            if value.is_null() {
                continue;
            }

            let reference = reference_value(&builtin, default, layer.kind(), key);
            if let Some(expected) = reference.map(ValueKind::of) {
                let found = ValueKind::of(value);
                if expected != found {
                    reject(&mut warnings, layer.kind(), key.clone(), expected, found);
                    continue;
                }
            }
            if let Some(expected) = value_constraint(key)
                && !expected.accepts(value)
            {
                reject(&mut warnings, layer.kind(), key.clone(), expected, ValueKind::of(value));
                continue;
            }

            match (merged.get_mut(key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    let nested_reference = reference.and_then(Value::as_object);
                    merge_nested(
                        existing,
                        incoming,
                        nested_reference,
                        layer.kind(),
                        key,
                        &mut warnings,
                    );
                }
                _ => {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
    }

    tracing::debug!(
        keys = merged.len(),
        rejected = warnings.len(),
        "Merged settings layers"
    );

    MergeReport {
        options: EffectiveOptions { values: merged },
        warnings,
    }
}

/// The value an override is type-checked against: the built-in default,
/// else the default layer's value (for user and project layers).
fn reference_value<'a>(
    builtin: &'a Map<String, Value>,
    default: &'a OptionLayer,
    kind: LayerKind,
    key: &str,
) -> Option<&'a Value> {
    builtin
        .get(key)
        .or_else(|| {
            if kind == LayerKind::Default {
                None
            } else {
                default.get(key)
            }
        })
        .filter(|v| !v.is_null())
}

fn merge_nested(
    existing: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    reference: Option<&Map<String, Value>>,
    kind: LayerKind,
    parent: &str,
    warnings: &mut Vec<ConfigError>,
) {
    for (key, value) in incoming {
        if value.is_null() {
            continue;
        }
        // Prefer the reference type; fall back to whatever a lower layer set.
        let expected = reference
            .and_then(|r| r.get(key))
            .or_else(|| existing.get(key))
            .filter(|v| !v.is_null())
            .map(ValueKind::of);
        if let Some(expected) = expected {
            let found = ValueKind::of(value);
            if expected != found {
                reject(warnings, kind, format!("{parent}.{key}"), expected, found);
                continue;
            }
        }
        existing.insert(key.clone(), value.clone());
    }
}

fn reject(
    warnings: &mut Vec<ConfigError>,
    layer: LayerKind,
    key: String,
    expected: ValueKind,
    found: ValueKind,
) {
    tracing::warn!(
        layer = %layer,
        key = %key,
        expected = %expected,
        found = %found,
        "Ignoring settings override with mismatched type"
    );
    warnings.push(ConfigError::TypeMismatch {
        layer,
        key,
        expected,
        found,
    });
}
