//! String-keyed factories standing in for dynamic class loading.
//!
//! A [`PluginFactoryRegistry`] is built once, populated by explicit
//! registration calls, and handed to the initializer. Configuration refers to
//! components by the ids registered here.

use super::classes::ClassRegistry;
use super::resources::{LOGGING, METRICS_COLLECTOR};
use crate::core::PipelineStage;
use crate::plugins::{BasicLogger, ErrorFormatter, Plugin, PluginKind, StaticFallback};
use crate::resources::{
    EchoLlm, InMemoryCache, InMemoryMemory, InMemoryStorage, LoggingResource, MetricsCollector,
    Resource,
};
use crate::tools::Tool;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Everything a factory needs to build one configured component.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSetup {
    /// The configured name.
    pub name: String,
    /// The resolved stages. Empty for resources and tools.
    pub stages: Vec<PipelineStage>,
    /// Free-form configuration from the config file.
    pub config: Value,
}

impl PluginSetup {
    /// Creates a setup with an empty config.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            config: Value::Object(serde_json::Map::new()),
        }
    }

    /// Returns a string config value.
    #[must_use]
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Returns a float config value.
    #[must_use]
    pub fn config_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(Value::as_f64)
    }
}

/// Builds a resource.
pub type ResourceFactory =
    Arc<dyn Fn(&PluginSetup) -> anyhow::Result<Arc<dyn Resource>> + Send + Sync>;
/// Builds a tool.
pub type ToolFactory = Arc<dyn Fn(&PluginSetup) -> anyhow::Result<Arc<dyn Tool>> + Send + Sync>;
/// Builds a stage plugin.
pub type PluginFactory =
    Arc<dyn Fn(&PluginSetup) -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync>;
/// Class-level config check, run before anything is constructed.
pub type ConfigValidator = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;
/// Class-level dependency check against every registered class.
pub type DependencyValidator = Arc<dyn Fn(&ClassRegistry) -> anyhow::Result<()> + Send + Sync>;

/// How a class builds its instances.
#[derive(Clone)]
pub enum Constructor {
    /// Builds a resource.
    Resource(ResourceFactory),
    /// Builds a tool.
    Tool(ToolFactory),
    /// Builds a stage plugin.
    Plugin(PluginFactory),
}

/// A registered component class.
#[derive(Clone)]
pub struct PluginClass {
    /// The id configuration refers to.
    pub id: String,
    /// The component kind.
    pub kind: PluginKind,
    /// Stages declared by the class itself.
    pub stages: Vec<PipelineStage>,
    /// Dependencies declared by the class itself.
    pub dependencies: Vec<String>,
    /// The constructor.
    pub constructor: Constructor,
    /// Optional config check.
    pub validate_config: Option<ConfigValidator>,
    /// Optional dependency check.
    pub validate_dependencies: Option<DependencyValidator>,
}

impl PluginClass {
    fn with_constructor(id: impl Into<String>, kind: PluginKind, constructor: Constructor) -> Self {
        Self {
            id: id.into(),
            kind,
            stages: Vec::new(),
            dependencies: Vec::new(),
            constructor,
            validate_config: None,
            validate_dependencies: None,
        }
    }

    /// Declares a resource class.
    pub fn resource<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PluginSetup) -> anyhow::Result<Arc<dyn Resource>> + Send + Sync + 'static,
    {
        Self::with_constructor(id, PluginKind::Resource, Constructor::Resource(Arc::new(factory)))
    }

    /// Declares a tool class.
    pub fn tool<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&PluginSetup) -> anyhow::Result<Arc<dyn Tool>> + Send + Sync + 'static,
    {
        Self::with_constructor(id, PluginKind::Tool, Constructor::Tool(Arc::new(factory)))
    }

    /// Declares a stage plugin class of the given kind.
    pub fn plugin<F>(id: impl Into<String>, kind: PluginKind, factory: F) -> Self
    where
        F: Fn(&PluginSetup) -> anyhow::Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        Self::with_constructor(id, kind, Constructor::Plugin(Arc::new(factory)))
    }

    /// Sets the class-level stages.
    #[must_use]
    pub fn with_stages(mut self, stages: impl IntoIterator<Item = PipelineStage>) -> Self {
        self.stages = stages.into_iter().collect();
        self
    }

    /// Sets the class-level dependencies. A trailing `?` marks one optional.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the config check.
    #[must_use]
    pub fn with_config_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate_config = Some(Arc::new(validator));
        self
    }

    /// Sets the dependency check.
    #[must_use]
    pub fn with_dependency_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ClassRegistry) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.validate_dependencies = Some(Arc::new(validator));
        self
    }
}

impl std::fmt::Debug for PluginClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClass")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stages", &self.stages)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Id → class table consulted during registration.
#[derive(Debug, Clone, Default)]
pub struct PluginFactoryRegistry {
    classes: HashMap<String, PluginClass>,
}

impl PluginFactoryRegistry {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding every built-in component.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Registers the built-in resources and ERROR-stage plugins.
    ///
    /// | id | component |
    /// |----|-----------|
    /// | `metrics_collector` | [`MetricsCollector`] |
    /// | `logging` | [`LoggingResource`] |
    /// | `memory.in_memory` | [`InMemoryMemory`] |
    /// | `cache.in_memory` | [`InMemoryCache`] (`default_ttl_secs`) |
    /// | `storage.in_memory` | [`InMemoryStorage`] |
    /// | `llm.echo` | [`EchoLlm`] (`prefix`) |
    /// | `error.basic_logger` | [`BasicLogger`] |
    /// | `error.static_fallback` | [`StaticFallback`] (`message`) |
    /// | `error.formatter` | [`ErrorFormatter`] |
    pub fn register_defaults(&mut self) {
        self.register(metrics_collector_class());
        self.register(logging_class());
        self.register(PluginClass::resource("memory.in_memory", |setup| {
            Ok(Arc::new(InMemoryMemory::new(&setup.name)))
        }));
        self.register(
            PluginClass::resource("cache.in_memory", |setup| {
                let mut cache = InMemoryCache::new(&setup.name);
                if let Some(secs) = setup.config_f64("default_ttl_secs") {
                    cache = cache.with_default_ttl(Duration::try_from_secs_f64(secs)?);
                }
                Ok(Arc::new(cache))
            })
            .with_config_validator(|config| {
                if let Some(ttl) = config.get("default_ttl_secs") {
                    anyhow::ensure!(
                        ttl.as_f64().is_some_and(|secs| secs > 0.0),
                        "default_ttl_secs must be a positive number"
                    );
                }
                Ok(())
            }),
        );
        self.register(PluginClass::resource("storage.in_memory", |setup| {
            Ok(Arc::new(InMemoryStorage::new(&setup.name)))
        }));
        self.register(PluginClass::resource("llm.echo", |setup| {
            let llm = EchoLlm::new(&setup.name).with_prefix(setup.config_str("prefix").unwrap_or(""));
            Ok(Arc::new(llm))
        }));
        self.register(PluginClass::plugin(
            "error.basic_logger",
            PluginKind::Failure,
            |setup| Ok(Arc::new(BasicLogger::new(&setup.name))),
        ));
        self.register(PluginClass::plugin(
            "error.static_fallback",
            PluginKind::Failure,
            |setup| {
                let mut plugin = StaticFallback::new(&setup.name);
                if let Some(message) = setup.config_str("message") {
                    plugin = plugin.with_message(message);
                }
                Ok(Arc::new(plugin))
            },
        ));
        self.register(PluginClass::plugin(
            "error.formatter",
            PluginKind::Failure,
            |setup| Ok(Arc::new(ErrorFormatter::new(&setup.name))),
        ));
    }

    /// Registers a class, replacing any previous class with the same id.
    pub fn register(&mut self, class: PluginClass) -> &mut Self {
        self.classes.insert(class.id.clone(), class);
        self
    }

    /// Returns a class by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PluginClass> {
        self.classes.get(id)
    }

    /// Returns every registered id, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.classes.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// The class used when the configuration does not name a metrics collector.
#[must_use]
pub fn metrics_collector_class() -> PluginClass {
    PluginClass::resource(METRICS_COLLECTOR, |setup| {
        Ok(Arc::new(MetricsCollector::new(&setup.name)))
    })
}

/// The class used when the configuration does not name a logging resource.
#[must_use]
pub fn logging_class() -> PluginClass {
    PluginClass::resource(LOGGING, |setup| Ok(Arc::new(LoggingResource::new(&setup.name))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_registered() {
        let registry = PluginFactoryRegistry::with_defaults();
        for id in ["metrics_collector", "logging", "memory.in_memory", "llm.echo", "error.static_fallback"] {
            assert!(registry.get(id).is_some(), "missing {id}");
        }
        assert!(registry.get("openai").is_none());
    }

    #[test]
    fn test_resource_factory_uses_configured_name() {
        let registry = PluginFactoryRegistry::with_defaults();
        let class = registry.get("storage.in_memory").unwrap();
        let Constructor::Resource(factory) = &class.constructor else {
            panic!("expected a resource constructor");
        };

        let resource = factory(&PluginSetup::new("blobs")).unwrap();
        assert_eq!(resource.name(), "blobs");
        assert!(resource.as_storage().is_some());
    }

    #[test]
    fn test_cache_config_validator() {
        let registry = PluginFactoryRegistry::with_defaults();
        let validator = registry
            .get("cache.in_memory")
            .and_then(|c| c.validate_config.clone())
            .unwrap();

        assert!(validator(&json!({"default_ttl_secs": 30})).is_ok());
        assert!(validator(&json!({"default_ttl_secs": -1})).is_err());
        assert!(validator(&json!({})).is_ok());
    }

    #[test]
    fn test_failure_classes_are_failure_kind() {
        let registry = PluginFactoryRegistry::with_defaults();
        let class = registry.get("error.basic_logger").unwrap();
        assert_eq!(class.kind, PluginKind::Failure);
        assert_eq!(class.kind.default_stages(), &[PipelineStage::Error]);
    }
}
