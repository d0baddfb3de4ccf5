//! Stage-keyed registry of plugin instances.

use crate::core::PipelineStage;
use crate::plugins::Plugin;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A plugin registered for one stage.
#[derive(Clone)]
pub struct RegisteredPlugin {
    /// The configured plugin name.
    pub name: String,
    /// The plugin instance.
    pub plugin: Arc<dyn Plugin>,
}

impl std::fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registry of stage plugins.
///
/// Within a stage, registration order is execution order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    stages: RwLock<BTreeMap<PipelineStage, Vec<RegisteredPlugin>>>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plugin to a stage's list.
    pub fn register_for_stage(
        &self,
        plugin: Arc<dyn Plugin>,
        stage: PipelineStage,
        name: impl Into<String>,
    ) {
        self.stages
            .write()
            .entry(stage)
            .or_default()
            .push(RegisteredPlugin {
                name: name.into(),
                plugin,
            });
    }

    /// Returns a stage's plugins in registration order.
    #[must_use]
    pub fn get_for_stage(&self, stage: PipelineStage) -> Vec<RegisteredPlugin> {
        self.stages.read().get(&stage).cloned().unwrap_or_default()
    }

    /// Returns a stage's plugin names in registration order.
    #[must_use]
    pub fn names_for_stage(&self, stage: PipelineStage) -> Vec<String> {
        self.stages
            .read()
            .get(&stage)
            .map(|plugins| plugins.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns each distinct plugin once, in first-registration order.
    #[must_use]
    pub fn all_plugins(&self) -> Vec<RegisteredPlugin> {
        let mut seen = Vec::<String>::new();
        let mut plugins = Vec::new();
        for registered in self.stages.read().values().flatten() {
            if !seen.contains(&registered.name) {
                seen.push(registered.name.clone());
                plugins.push(registered.clone());
            }
        }
        plugins
    }

    /// Returns true if the stage has at least one plugin.
    #[must_use]
    pub fn has_stage(&self, stage: PipelineStage) -> bool {
        self.stages
            .read()
            .get(&stage)
            .is_some_and(|plugins| !plugins.is_empty())
    }
}
