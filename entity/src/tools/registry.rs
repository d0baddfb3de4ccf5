//! Name-keyed registry of tool instances.

use super::Tool;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of tools available to plugins.
///
/// Lookups for unknown names return `None`.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    order: RwLock<Vec<String>>,
    concurrency_limit: Option<usize>,
}

impl ToolRegistry {
    /// Creates an empty registry with unbounded concurrency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how many queued calls may run at once.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = Some(limit.max(1));
        self
    }

    /// Returns the concurrency bound for queued calls, if any.
    #[must_use]
    pub fn concurrency_limit(&self) -> Option<usize> {
        self.concurrency_limit
    }

    /// Registers a tool under its own name.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        self.register_as(name, tool)
    }

    /// Registers a tool under an explicit name, replacing any previous one.
    pub fn register_as(&self, name: impl Into<String>, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = name.into();
        let previous = self.tools.write().insert(name.clone(), tool);
        if previous.is_none() {
            self.order.write().push(name);
        }
        previous
    }

    /// Returns a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Returns true if a tool is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Returns tool names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.read().clone()
    }

    /// Returns the number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Returns true if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .field("concurrency_limit", &self.concurrency_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&self, params: Value) -> anyhow::Result<Value> {
            Ok(params)
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Named("search")));
        registry.register_as("calc", Arc::new(Named("calculator")));

        assert!(registry.get("search").is_some());
        assert_eq!(registry.get("calc").map(|t| t.name().to_string()), Some("calculator".into()));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.names(), vec!["search", "calc"]);
    }

    #[test]
    fn test_replacing_keeps_single_entry() {
        let registry = ToolRegistry::new();
        assert!(registry.register(Arc::new(Named("a"))).is_none());
        assert!(registry.register(Arc::new(Named("a"))).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names().len(), 1);
    }

    #[test]
    fn test_concurrency_limit_floor() {
        let registry = ToolRegistry::new().with_concurrency_limit(0);
        assert_eq!(registry.concurrency_limit(), Some(1));
    }
}
