//! Name-keyed registry of shared resources.

use crate::resources::{MetricsCollector, Resource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Name under which the metrics collector is registered.
pub const METRICS_COLLECTOR: &str = "metrics_collector";
/// Name under which the default logging resource is registered.
pub const LOGGING: &str = "logging";
/// Name of the memory resource used by `remember`/`recall`.
pub const MEMORY: &str = "memory";
/// Name of the cache resource used for tool results.
pub const CACHE: &str = "cache";

/// Registry of constructed resources, in registration order.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: RwLock<HashMap<String, Arc<dyn Resource>>>,
    order: RwLock<Vec<String>>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource, replacing any previous one with the same name.
    pub fn add(&self, name: impl Into<String>, resource: Arc<dyn Resource>) {
        let name = name.into();
        if self.resources.write().insert(name.clone(), resource).is_none() {
            self.order.write().push(name);
        }
    }

    /// Returns a resource by name, or `None` when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Resource>> {
        self.resources.read().get(name).cloned()
    }

    /// Returns true if a resource is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.read().contains_key(name)
    }

    /// Returns resource names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Returns every resource in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<(String, Arc<dyn Resource>)> {
        let resources = self.resources.read();
        self.order
            .read()
            .iter()
            .filter_map(|name| resources.get(name).map(|r| (name.clone(), r.clone())))
            .collect()
    }

    /// Returns the memory resource: the one named `memory`, else the first
    /// resource exposing the memory interface.
    #[must_use]
    pub fn memory(&self) -> Option<Arc<dyn Resource>> {
        self.find_capable(MEMORY, |r| r.as_memory().is_some())
    }

    /// Returns the cache resource, found the same way as [`Self::memory`].
    #[must_use]
    pub fn cache(&self) -> Option<Arc<dyn Resource>> {
        self.find_capable(CACHE, |r| r.as_cache().is_some())
    }

    /// Returns the metrics collector resource.
    #[must_use]
    pub fn metrics(&self) -> Option<Arc<dyn Resource>> {
        self.find_capable(METRICS_COLLECTOR, |r| r.as_metrics().is_some())
    }

    /// Runs `f` against the metrics collector when one is registered.
    pub fn with_metrics(&self, f: impl FnOnce(&MetricsCollector)) {
        if let Some(resource) = self.metrics() {
            if let Some(metrics) = resource.as_metrics() {
                f(metrics);
            }
        }
    }

    fn find_capable(
        &self,
        preferred: &str,
        capable: impl Fn(&dyn Resource) -> bool,
    ) -> Option<Arc<dyn Resource>> {
        if let Some(resource) = self.get(preferred) {
            if capable(resource.as_ref()) {
                return Some(resource);
            }
        }
        self.all()
            .into_iter()
            .map(|(_, r)| r)
            .find(|r| capable(r.as_ref()))
    }

    /// Returns the number of registered resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

impl std::fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{InMemoryCache, InMemoryMemory, LoggingResource};

    #[test]
    fn test_get_returns_none_for_unknown() {
        let registry = ResourceRegistry::new();
        assert!(registry.get("database").is_none());
        assert!(registry.memory().is_none());
    }

    #[test]
    fn test_preserves_registration_order() {
        let registry = ResourceRegistry::new();
        registry.add("logging", Arc::new(LoggingResource::default()));
        registry.add("memory", Arc::new(InMemoryMemory::new("memory")));

        assert_eq!(registry.names(), vec!["logging", "memory"]);
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_capability_lookup_falls_back_to_any_name() {
        let registry = ResourceRegistry::new();
        registry.add("kv", Arc::new(InMemoryCache::new("kv")));

        let cache = registry.cache().unwrap();
        assert_eq!(cache.name(), "kv");
    }

    #[test]
    fn test_with_metrics_runs_only_when_registered() {
        let registry = ResourceRegistry::new();
        let mut called = false;
        registry.with_metrics(|_| called = true);
        assert!(!called);

        registry.add(METRICS_COLLECTOR, Arc::new(MetricsCollector::default()));
        registry.with_metrics(|m| m.increment("x"));
        registry.with_metrics(|m| assert_eq!(m.counter("x"), 1));
    }
}
