//! The class registry built during registration and read during validation.

use super::factory::PluginClass;
use crate::core::PipelineStage;
use crate::errors::{ContractErrorInfo, InitPhase, InitializationError};
use crate::plugins::PluginKind;
use serde_json::Value;
use std::collections::HashMap;

/// One configured component, recorded before anything is constructed.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    /// The configured name.
    pub name: String,
    /// The class resolved from the config `type`.
    pub class: PluginClass,
    /// The free-form config passed to the factory.
    pub config: Value,
    /// Resolved stages. Empty for resources and tools.
    pub stages: Vec<PipelineStage>,
    /// Declared dependencies, including the implicit metrics collector.
    pub dependencies: Vec<String>,
    /// Declaration order.
    pub order: usize,
}

impl ClassEntry {
    /// Returns the component kind.
    #[must_use]
    pub fn kind(&self) -> PluginKind {
        self.class.kind
    }
}

/// Ordered name → class table.
///
/// Read-only once registration finishes.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    entries: Vec<ClassEntry>,
    index: HashMap<String, usize>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry, assigning its declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is already taken.
    pub fn insert(&mut self, mut entry: ClassEntry) -> Result<(), InitializationError> {
        if self.index.contains_key(&entry.name) {
            return Err(InitializationError::new(
                InitPhase::Registration,
                format!("'{}' is configured more than once", entry.name),
            )
            .with_plugin(&entry.name)
            .with_error_info(
                ContractErrorInfo::new("CONFIG-004-CLASS", "Duplicate plugin name")
                    .with_fix_hint("Give every configured plugin a unique name."),
            ));
        }
        entry.order = self.entries.len();
        self.index.insert(entry.name.clone(), entry.order);
        self.entries.push(entry);
        Ok(())
    }

    /// Returns an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ClassEntry> {
        self.index.get(name).map(|i| &self.entries[*i])
    }

    /// Returns true if the name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns every name in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Iterates entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.entries.iter()
    }

    /// Iterates entries of one kind in declaration order.
    pub fn of_kind(&self, kind: PluginKind) -> impl Iterator<Item = &ClassEntry> {
        self.entries.iter().filter(move |e| e.kind() == kind)
    }

    /// Returns the dependency map in declaration order.
    #[must_use]
    pub fn dependency_map(&self) -> Vec<(String, Vec<String>)> {
        self.entries
            .iter()
            .map(|e| (e.name.clone(), e.dependencies.clone()))
            .collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
