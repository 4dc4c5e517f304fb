//! Cached settings resolution.
//!
//! The merged settings are the only state shared between format actions.
//! [`SettingsCache`] merges lazily and drops the cached result whenever a
//! layer is replaced, so a settings change is visible to the next action
//! and never to one already in flight (that one holds its own `Arc`).

use std::sync::{Arc, Mutex, PoisonError};

use crate::ConfigError;
use crate::layer::{LayerKind, OptionLayer};
use crate::merge::{EffectiveOptions, merge_with_report};
use crate::settings::Settings;

/// A merged, typed settings snapshot.
#[derive(Debug)]
pub struct ResolvedSettings {
    /// Cache generation this snapshot was built in.
    pub generation: u64,
    /// The merged option map.
    pub options: EffectiveOptions,
    /// The typed view.
    pub settings: Settings,
    /// Overrides rejected while merging.
    pub warnings: Vec<ConfigError>,
}

#[derive(Debug)]
struct Inner {
    default: OptionLayer,
    user: OptionLayer,
    project: OptionLayer,
    generation: u64,
    resolved: Option<Arc<ResolvedSettings>>,
}

/// Thread-safe cache of the merged settings.
#[derive(Debug)]
pub struct SettingsCache {
    inner: Mutex<Inner>,
}

impl SettingsCache {
    /// Create a cache over the three layers.
    pub fn new(default: OptionLayer, user: OptionLayer, project: OptionLayer) -> Self {
        Self {
            inner: Mutex::new(Inner {
                default,
                user,
                project,
                generation: 0,
                resolved: None,
            }),
        }
    }

    /// A cache with every layer empty (built-in defaults only).
    pub fn builtin() -> Self {
        Self::new(
            OptionLayer::empty(LayerKind::Default),
            OptionLayer::empty(LayerKind::User),
            OptionLayer::empty(LayerKind::Project),
        )
    }

    /// Replace the layer of the same kind and invalidate the cache.
    pub fn replace_layer(&self, layer: OptionLayer) {
        let mut inner = self.lock();
        let kind = layer.kind();
        match kind {
            LayerKind::Default => inner.default = layer,
            LayerKind::User => inner.user = layer,
            LayerKind::Project => inner.project = layer,
        }
        inner.generation += 1;
        inner.resolved = None;
        tracing::debug!(layer = %kind, generation = inner.generation, "Settings layer replaced");
    }

    /// Drop the cached result without changing any layer.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.resolved = None;
    }

    /// Current cache generation; bumps on every invalidation.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Return the cached settings, merging first if needed.
    pub fn resolve(&self) -> Arc<ResolvedSettings> {
        let mut inner = self.lock();
        if let Some(resolved) = &inner.resolved {
            return Arc::clone(resolved);
        }

        let report = merge_with_report(&inner.default, &inner.user, &inner.project);
        let settings = Settings::from_options(&report.options);
        let resolved = Arc::new(ResolvedSettings {
            generation: inner.generation,
            options: report.options,
            settings,
            warnings: report.warnings,
        });
        inner.resolved = Some(Arc::clone(&resolved));
        resolved
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SettingsCache {
    fn default() -> Self {
        Self::builtin()
    }
}
