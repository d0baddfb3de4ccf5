//! Four-phase startup.
//!
//! 1. Registration: resolve every configured `type` to a class.
//! 2. Validation: class hooks, required resources, dependency sort.
//! 3. Resources: construct, initialize, then runtime-validate concurrently
//!    through the category circuit breakers.
//! 4. Plugins: build tools and stage plugins, register, initialize.
//!
//! A failure in phase 3 or 4 tears down everything already built before the
//! error is returned.

use super::dependency_graph::DependencyGraph;
use crate::config::{section_kinds, PluginEntry, RuntimeConfig, SystemConfig};
use crate::core::PipelineStage;
use crate::errors::{ContractErrorInfo, InitPhase, InitializationError};
use crate::lifecycle::{CleanupRegistry, CleanupReport};
use crate::plugins::{Plugin, PluginKind};
use crate::registry::factory::{logging_class, metrics_collector_class};
use crate::registry::{
    ClassEntry, ClassRegistry, Constructor, PluginClass, PluginFactoryRegistry, PluginRegistry,
    PluginSetup, ResourceRegistry, LOGGING, METRICS_COLLECTOR,
};
use crate::reliability::{BreakerError, BreakerManager};
use crate::resources::Resource;
use crate::tools::ToolRegistry;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message used when a resource keeps failing runtime validation.
pub const VALIDATION_FAILED_MESSAGE: &str = "Failure threshold exceeded. Inspect resource configuration.";

/// Everything a running engine needs, produced by [`SystemInitializer::initialize`].
#[derive(Debug, Clone)]
pub struct Registries {
    /// Stage plugins in execution order.
    pub plugins: Arc<PluginRegistry>,
    /// Shared resources.
    pub resources: Arc<ResourceRegistry>,
    /// Callable tools.
    pub tools: Arc<ToolRegistry>,
    /// One breaker per resource category.
    pub breakers: Arc<BreakerManager>,
    /// Engine tuning.
    pub runtime: RuntimeConfig,
    /// Teardown callbacks for everything built at startup.
    pub cleanup: Arc<CleanupRegistry>,
}

impl Registries {
    /// Creates empty registries, mainly for tests and embedding.
    #[must_use]
    pub fn new(runtime: RuntimeConfig) -> Self {
        let mut tools = ToolRegistry::new();
        if let Some(limit) = runtime.tool_concurrency_limit {
            tools = tools.with_concurrency_limit(limit);
        }
        Self {
            plugins: Arc::new(PluginRegistry::new()),
            resources: Arc::new(ResourceRegistry::new()),
            tools: Arc::new(tools),
            breakers: Arc::new(BreakerManager::new(&runtime.breaker)),
            cleanup: Arc::new(CleanupRegistry::new(runtime.cleanup_timeout())),
            runtime,
        }
    }

    /// Shuts plugins and resources down in reverse construction order.
    pub async fn shutdown(&self) -> CleanupReport {
        let report = self.cleanup.run_all().await;
        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "Registries shut down"
        );
        report
    }
}

/// Builds [`Registries`] from a [`SystemConfig`].
#[derive(Debug, Clone)]
pub struct SystemInitializer {
    config: SystemConfig,
    factories: PluginFactoryRegistry,
}

impl SystemInitializer {
    /// Creates an initializer with an explicit factory table.
    #[must_use]
    pub fn new(config: SystemConfig, factories: PluginFactoryRegistry) -> Self {
        Self { config, factories }
    }

    /// Creates an initializer that knows only the built-in components.
    #[must_use]
    pub fn with_defaults(config: SystemConfig) -> Self {
        Self::new(config, PluginFactoryRegistry::with_defaults())
    }

    /// Adds the built-in components to the factory table.
    pub fn register_defaults(&mut self) -> &mut Self {
        self.factories.register_defaults();
        self
    }

    /// Adds a component class.
    pub fn register_class(&mut self, class: PluginClass) -> &mut Self {
        self.factories.register(class);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Runs all four phases.
    ///
    /// # Errors
    ///
    /// Returns the first [`InitializationError`]. Nothing built before the
    /// failure is left running.
    pub async fn initialize(&self) -> Result<Registries, InitializationError> {
        let classes = self.register_classes()?;
        let order = self.validate(&classes)?;

        let registries = Registries::new(self.config.runtime.clone());
        let built = async {
            self.build_resources(&classes, &order, &registries).await?;
            self.build_plugins(&classes, &registries).await
        }
        .await;

        if let Err(e) = built {
            warn!(phase = %e.phase, error = %e, "Startup failed; cleaning up");
            let report = registries.cleanup.run_all().await;
            if !report.is_clean() {
                warn!(failed = ?report.failed, "Cleanup after failed startup was incomplete");
            }
            return Err(e);
        }

        info!(
            resources = registries.resources.len(),
            tools = registries.tools.len(),
            plugins = registries.plugins.all_plugins().len(),
            "System initialized"
        );
        Ok(registries)
    }

    /// Phase 1: resolves every configured entry to a class.
    ///
    /// # Errors
    ///
    /// Fails for an unknown `type`, a kind that does not belong in its
    /// section, an unknown stage, a stage plugin without any stage, a
    /// duplicate name, or a workflow naming an unknown plugin.
    pub fn register_classes(&self) -> Result<ClassRegistry, InitializationError> {
        let workflow = self.parse_workflow()?;
        let mut classes = ClassRegistry::new();

        if !self.config.contains(METRICS_COLLECTOR) {
            classes.insert(implicit_entry(METRICS_COLLECTOR, metrics_collector_class()))?;
        }
        if !self.config.contains(LOGGING) {
            classes.insert(implicit_entry(LOGGING, logging_class()))?;
        }

        for (section, entries) in self.config.sections() {
            for (name, entry) in entries.iter() {
                let class = self.resolve_class(section, name, entry)?;
                let stages = if class.kind.is_stage_plugin() {
                    resolve_stages(name, entry, &class, &workflow)?
                } else {
                    Vec::new()
                };
                let dependencies = merge_dependencies(name, &class.dependencies, &entry.dependencies);
                debug!(plugin = name, kind = %class.kind, ?stages, "Registered class");

                classes.insert(ClassEntry {
                    name: name.to_string(),
                    class,
                    config: Value::Object(entry.config.clone()),
                    stages,
                    dependencies,
                    order: 0,
                })?;
            }
        }

        for (stage, names) in &workflow {
            for name in names {
                let known = classes.get(name).is_some_and(|e| e.kind().is_stage_plugin());
                if !known {
                    return Err(InitializationError::new(
                        InitPhase::Registration,
                        format!("Workflow stage {stage} references unknown plugin '{name}'"),
                    )
                    .with_plugin(name)
                    .with_error_info(
                        ContractErrorInfo::new("CONFIG-004-CLASS", "Unknown workflow plugin")
                            .with_fix_hint("List only configured adapter or prompt plugins in the workflow."),
                    ));
                }
            }
        }

        Ok(classes)
    }

    /// Phase 2: runs class hooks, checks required resources, and sorts
    /// dependencies. Returns every name in dependency order.
    ///
    /// # Errors
    ///
    /// Fails on the first hook error, missing required resource, missing
    /// dependency, or cycle.
    pub fn validate(&self, classes: &ClassRegistry) -> Result<Vec<String>, InitializationError> {
        for required in &self.config.runtime.required_resources {
            let present = classes.get(required).is_some_and(|e| e.kind() == PluginKind::Resource);
            if !present {
                return Err(InitializationError::new(
                    InitPhase::Validation,
                    format!("Required resource '{required}' is not configured"),
                )
                .with_plugin(required)
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-005-REQUIRED_RESOURCE", "Missing canonical resource")
                        .with_fix_hint("Add the resource to the `resources` section."),
                ));
            }
        }

        for entry in classes.iter() {
            if let Some(validator) = &entry.class.validate_dependencies {
                validator(classes).map_err(|e| {
                    InitializationError::new(
                        InitPhase::Validation,
                        format!("Dependency validation failed: {e}"),
                    )
                    .with_plugin(&entry.name)
                })?;
            }
            if let Some(validator) = &entry.class.validate_config {
                validator(&entry.config).map_err(|e| {
                    InitializationError::new(
                        InitPhase::Validation,
                        format!("Config validation failed: {e}"),
                    )
                    .with_plugin(&entry.name)
                })?;
            }
        }

        let order = DependencyGraph::new(classes.dependency_map()).topological_sort()?;
        debug!(?order, "Dependency order resolved");
        Ok(order)
    }

    async fn build_resources(
        &self,
        classes: &ClassRegistry,
        order: &[String],
        registries: &Registries,
    ) -> Result<(), InitializationError> {
        let resource_fail = |name: &str, what: &str, e: &anyhow::Error| {
            InitializationError::new(InitPhase::Resources, format!("{what}: {e}")).with_plugin(name)
        };

        for name in order {
            let Some(entry) = classes.get(name) else { continue };
            let Constructor::Resource(factory) = &entry.class.constructor else {
                continue;
            };

            let resource = factory(&setup_for(entry))
                .map_err(|e| resource_fail(name, "Failed to construct resource", &e))?;
            resource
                .initialize()
                .await
                .map_err(|e| resource_fail(name, "Failed to initialize resource", &e))?;

            let owned = Arc::clone(&resource);
            registries
                .cleanup
                .register(format!("resource:{name}"), move || async move { owned.shutdown().await });
            registries.resources.add(name.clone(), resource);
            debug!(resource = %name, "Resource initialized");
        }

        let checks = registries
            .resources
            .all()
            .into_iter()
            .map(|(name, resource)| self.validate_resource(name, resource, registries));
        for result in join_all(checks).await {
            result?;
        }
        Ok(())
    }

    async fn validate_resource(
        &self,
        name: String,
        resource: Arc<dyn Resource>,
        registries: &Registries,
    ) -> Result<(), InitializationError> {
        let breaker = registries.breakers.get(resource.category());
        let attempts = breaker.config().failure_threshold.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match breaker.call(|| resource.validate_runtime()).await {
                Ok(()) => {
                    info!(resource = %name, category = %resource.category(), "Resource validated");
                    return Ok(());
                }
                Err(BreakerError::Tripped(e)) => {
                    last_error = e.to_string();
                    break;
                }
                Err(BreakerError::Inner(e)) => {
                    warn!(resource = %name, attempt, error = %e, "Runtime validation failed");
                    last_error = e.to_string();
                    if breaker.is_open() {
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(self.config.runtime.validation_retry_delay()).await;
                    }
                }
            }
        }

        Err(
            InitializationError::new(InitPhase::Resources, VALIDATION_FAILED_MESSAGE)
                .with_plugin(&name)
                .with_error_info(
                    ContractErrorInfo::new("RUNTIME-001-VALIDATION", "Resource failed runtime validation")
                        .with_fix_hint("Check connectivity and credentials for the resource.")
                        .with_context_entry("category", resource.category().as_str())
                        .with_context_entry("last_error", last_error),
                ),
        )
    }

    async fn build_plugins(
        &self,
        classes: &ClassRegistry,
        registries: &Registries,
    ) -> Result<(), InitializationError> {
        let plugin_fail = |name: &str, what: &str, e: &anyhow::Error| {
            InitializationError::new(InitPhase::Plugins, format!("{what}: {e}")).with_plugin(name)
        };

        for entry in classes.iter() {
            if let Constructor::Tool(factory) = &entry.class.constructor {
                let tool = factory(&setup_for(entry))
                    .map_err(|e| plugin_fail(&entry.name, "Failed to construct tool", &e))?;
                registries.tools.register_as(entry.name.clone(), tool);
            }
        }

        let mut instances: Vec<(&ClassEntry, Arc<dyn Plugin>)> = Vec::new();
        for entry in classes.iter() {
            if let Constructor::Plugin(factory) = &entry.class.constructor {
                let plugin = factory(&setup_for(entry))
                    .map_err(|e| plugin_fail(&entry.name, "Failed to construct plugin", &e))?;
                instances.push((entry, plugin));
            }
        }

        let by_name: HashMap<&str, &Arc<dyn Plugin>> =
            instances.iter().map(|(e, p)| (e.name.as_str(), p)).collect();
        let workflow = self.parse_workflow()?;
        for stage in PipelineStage::ALL {
            for name in stage_order(stage, &instances, &workflow) {
                if let Some(plugin) = by_name.get(name) {
                    registries
                        .plugins
                        .register_for_stage(Arc::clone(plugin), stage, name);
                }
            }
        }

        for (entry, plugin) in &instances {
            plugin
                .initialize()
                .await
                .map_err(|e| plugin_fail(&entry.name, "Failed to initialize plugin", &e))?;
            let owned = Arc::clone(plugin);
            registries
                .cleanup
                .register(format!("plugin:{}", entry.name), move || async move { owned.shutdown().await });
        }
        Ok(())
    }

    fn resolve_class(
        &self,
        section: &str,
        name: &str,
        entry: &PluginEntry,
    ) -> Result<PluginClass, InitializationError> {
        let class_error = |message: String, summary: &str| {
            InitializationError::new(InitPhase::Registration, message)
                .with_plugin(name)
                .with_error_info(
                    ContractErrorInfo::new("CONFIG-004-CLASS", summary)
                        .with_context_entry("type", &entry.type_id)
                        .with_context_entry("section", section),
                )
        };

        let class = self.factories.get(&entry.type_id).ok_or_else(|| {
            class_error(
                format!("Unknown plugin type '{}'", entry.type_id),
                "No factory registered for this type",
            )
        })?;

        if !section_kinds(section).contains(&class.kind) {
            return Err(class_error(
                format!("A {} plugin cannot be configured under `{section}`", class.kind),
                "Plugin kind does not match its section",
            ));
        }
        Ok(class.clone())
    }

    fn parse_workflow(&self) -> Result<Vec<(PipelineStage, Vec<String>)>, InitializationError> {
        let mut workflow = Vec::with_capacity(self.config.workflow.len());
        for (stage, names) in &self.config.workflow {
            let stage = PipelineStage::from_string(stage).map_err(|e| stage_error(&e.to_string(), None))?;
            workflow.push((stage, names.clone()));
        }
        workflow.sort_by_key(|(stage, _)| *stage);
        Ok(workflow)
    }
}

fn implicit_entry(name: &str, class: PluginClass) -> ClassEntry {
    ClassEntry {
        name: name.to_string(),
        dependencies: merge_dependencies(name, &[], &[]),
        class,
        config: Value::Object(serde_json::Map::new()),
        stages: Vec::new(),
        order: 0,
    }
}

fn setup_for(entry: &ClassEntry) -> PluginSetup {
    PluginSetup {
        name: entry.name.clone(),
        stages: entry.stages.clone(),
        config: entry.config.clone(),
    }
}

fn stage_error(message: &str, plugin: Option<&str>) -> InitializationError {
    let err = InitializationError::new(InitPhase::Registration, message).with_error_info(
        ContractErrorInfo::new("CONFIG-003-STAGE", "Invalid or missing stage")
            .with_fix_hint("Set `stage` on the plugin or list it in the workflow."),
    );
    match plugin {
        Some(name) => err.with_plugin(name),
        None => err,
    }
}

/// Stage precedence: workflow, then config, then class, then kind default.
fn resolve_stages(
    name: &str,
    entry: &PluginEntry,
    class: &PluginClass,
    workflow: &[(PipelineStage, Vec<String>)],
) -> Result<Vec<PipelineStage>, InitializationError> {
    let from_workflow: Vec<PipelineStage> = workflow
        .iter()
        .filter(|(_, names)| names.iter().any(|n| n == name))
        .map(|(stage, _)| *stage)
        .collect();

    let mut stages = if !from_workflow.is_empty() {
        from_workflow
    } else if !entry.stage_names().is_empty() {
        entry
            .stage_names()
            .into_iter()
            .map(PipelineStage::from_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| stage_error(&e.to_string(), Some(name)))?
    } else if !class.stages.is_empty() {
        class.stages.clone()
    } else {
        class.kind.default_stages().to_vec()
    };

    if stages.is_empty() {
        return Err(stage_error(
            &format!("{} plugin '{name}' has no stage", class.kind),
            Some(name),
        ));
    }
    stages.sort();
    stages.dedup();
    Ok(stages)
}

/// Class dependencies, then config dependencies, then the metrics collector.
fn merge_dependencies(name: &str, class_deps: &[String], config_deps: &[String]) -> Vec<String> {
    let mut deps: Vec<String> = Vec::new();
    for dep in class_deps.iter().chain(config_deps) {
        if !deps.contains(dep) {
            deps.push(dep.clone());
        }
    }
    if name != METRICS_COLLECTOR && !deps.iter().any(|d| d == METRICS_COLLECTOR) {
        deps.push(METRICS_COLLECTOR.to_string());
    }
    deps
}

/// Workflow-listed plugins first in list order, then the rest in declaration order.
fn stage_order<'a>(
    stage: PipelineStage,
    instances: &'a [(&ClassEntry, Arc<dyn Plugin>)],
    workflow: &'a [(PipelineStage, Vec<String>)],
) -> Vec<&'a str> {
    let mut names: Vec<&str> = workflow
        .iter()
        .filter(|(s, _)| *s == stage)
        .flat_map(|(_, names)| names.iter().map(String::as_str))
        .collect();
    for (entry, _) in instances {
        if entry.stages.contains(&stage) && !names.contains(&entry.name.as_str()) {
            names.push(entry.name.as_str());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PluginSection;
    use crate::testing::{counting_plugin_class, echo_prompt_class, failing_resource_class, CalculatorTool};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn base_config() -> SystemConfig {
        let mut config = SystemConfig::default();
        config.resources = PluginSection::new()
            .with("memory", PluginEntry::new("memory.in_memory"))
            .with("llm", PluginEntry::new("llm.echo"))
            .with("storage", PluginEntry::new("storage.in_memory"));
        config
    }

    fn initializer(config: SystemConfig) -> SystemInitializer {
        let mut init = SystemInitializer::with_defaults(config);
        init.register_class(echo_prompt_class("test.echo"));
        init.register_class(PluginClass::tool("tool.calc", |_| Ok(Arc::new(CalculatorTool::new()))));
        init
    }

    #[test]
    fn test_registration_adds_implicit_resources() {
        let classes = initializer(base_config()).register_classes().unwrap();

        assert_eq!(
            classes.names(),
            vec!["metrics_collector", "logging", "memory", "llm", "storage"]
        );
        assert!(classes.get("metrics_collector").unwrap().dependencies.is_empty());
        assert_eq!(classes.get("llm").unwrap().dependencies, vec!["metrics_collector"]);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let mut config = base_config();
        config.prompts = PluginSection::new().with("p", PluginEntry::new("nope"));

        let err = initializer(config).register_classes().unwrap_err();
        assert_eq!(err.phase, InitPhase::Registration);
        assert_eq!(err.plugin.as_deref(), Some("p"));
        assert_eq!(err.error_info.unwrap().code, "CONFIG-004-CLASS");
    }

    #[test]
    fn test_kind_must_match_section() {
        let mut config = base_config();
        config.tools = PluginSection::new().with("m", PluginEntry::new("memory.in_memory"));

        let err = initializer(config).register_classes().unwrap_err();
        assert_eq!(err.error_info.unwrap().code, "CONFIG-004-CLASS");
    }

    #[test]
    fn test_stage_precedence() {
        let mut config = base_config();
        config.prompts = PluginSection::new()
            .with("default", PluginEntry::new("test.echo"))
            .with("configured", PluginEntry::new("test.echo").with_stage("review"))
            .with("listed", PluginEntry::new("test.echo").with_stage("REVIEW"));
        config.workflow.insert("DO".into(), vec!["listed".into()]);

        let classes = initializer(config).register_classes().unwrap();
        assert_eq!(classes.get("default").unwrap().stages, vec![PipelineStage::Think]);
        assert_eq!(classes.get("configured").unwrap().stages, vec![PipelineStage::Review]);
        assert_eq!(classes.get("listed").unwrap().stages, vec![PipelineStage::Do]);
    }

    #[test]
    fn test_adapter_without_stage_is_rejected() {
        let mut init = initializer({
            let mut config = base_config();
            config.adapters = PluginSection::new().with("in", PluginEntry::new("test.adapter"));
            config
        });
        init.register_class(counting_plugin_class("test.adapter", PluginKind::Adapter, Arc::default()));

        let err = init.register_classes().unwrap_err();
        assert_eq!(err.plugin.as_deref(), Some("in"));
        assert_eq!(err.error_info.unwrap().code, "CONFIG-003-STAGE");
    }

    #[test]
    fn test_unknown_stage_is_rejected() {
        let mut config = base_config();
        config.prompts = PluginSection::new().with("p", PluginEntry::new("test.echo").with_stage("LATER"));

        let err = initializer(config).register_classes().unwrap_err();
        assert_eq!(err.error_info.unwrap().code, "CONFIG-003-STAGE");
    }

    #[test]
    fn test_workflow_unknown_plugin_is_rejected() {
        let mut config = base_config();
        config.workflow.insert("THINK".into(), vec!["ghost".into()]);

        let err = initializer(config).register_classes().unwrap_err();
        assert_eq!(err.plugin.as_deref(), Some("ghost"));
    }

    #[test]
    fn test_missing_required_resource() {
        let mut config = base_config();
        config.resources = PluginSection::new().with("memory", PluginEntry::new("memory.in_memory"));

        let init = initializer(config);
        let classes = init.register_classes().unwrap();
        let err = init.validate(&classes).unwrap_err();
        assert_eq!(err.phase, InitPhase::Validation);
        assert_eq!(err.plugin.as_deref(), Some("llm"));
        assert_eq!(err.error_info.unwrap().code, "CONFIG-005-REQUIRED_RESOURCE");
    }

    #[test]
    fn test_config_validator_runs() {
        let mut config = base_config();
        config.resources.insert(
            "cache",
            PluginEntry::new("cache.in_memory").with_config("default_ttl_secs", -5),
        );

        let init = initializer(config);
        let classes = init.register_classes().unwrap();
        let err = init.validate(&classes).unwrap_err();
        assert_eq!(err.plugin.as_deref(), Some("cache"));
        assert!(err.message.contains("default_ttl_secs"));
    }

    #[test]
    fn test_dependency_cycle_is_rejected() {
        let mut config = base_config();
        config.prompts = PluginSection::new()
            .with("a", PluginEntry::new("test.echo").with_dependencies(["b"]))
            .with("b", PluginEntry::new("test.echo").with_dependencies(["a"]));

        let init = initializer(config);
        let classes = init.register_classes().unwrap();
        let err = init.validate(&classes).unwrap_err();
        assert_eq!(err.error_info.unwrap().code, "CONFIG-001-CYCLE");
    }

    #[tokio::test]
    async fn test_initialize_builds_everything() {
        let mut config = base_config();
        config.tools = PluginSection::new().with("calc", PluginEntry::new("tool.calc"));
        config.prompts = PluginSection::new()
            .with("second", PluginEntry::new("test.echo"))
            .with("first", PluginEntry::new("test.echo"));
        config.adapters = PluginSection::new().with("fallback", PluginEntry::new("error.static_fallback"));
        config.workflow.insert("THINK".into(), vec!["first".into()]);

        let registries = initializer(config).initialize().await.unwrap();

        assert!(registries.resources.contains("metrics_collector"));
        assert!(registries.resources.contains("logging"));
        assert!(registries.resources.memory().is_some());
        assert!(registries.tools.contains("calc"));
        assert_eq!(registries.plugins.names_for_stage(PipelineStage::Think), vec!["first", "second"]);
        assert_eq!(registries.plugins.names_for_stage(PipelineStage::Error), vec!["fallback"]);

        let report = registries.shutdown().await;
        assert!(report.is_clean());
        assert!(report.completed.iter().any(|n| n == "resource:memory"));
        // Plugins were registered for teardown after resources, so they go first.
        assert!(report.completed.first().unwrap().starts_with("plugin:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runtime_validation_failure_aborts_before_plugins() {
        let instantiated = Arc::new(AtomicUsize::new(0));
        let mut config = base_config();
        config.custom_resources = PluginSection::new().with("flaky_db", PluginEntry::new("test.failing"));
        config.prompts = PluginSection::new().with("p", PluginEntry::new("test.counting"));

        let mut init = initializer(config);
        init.register_class(failing_resource_class("test.failing"));
        init.register_class(counting_plugin_class("test.counting", PluginKind::Prompt, instantiated.clone()));

        let err = init.initialize().await.unwrap_err();
        assert_eq!(err.phase, InitPhase::Resources);
        assert_eq!(err.plugin.as_deref(), Some("flaky_db"));
        assert_eq!(err.message, VALIDATION_FAILED_MESSAGE);
        assert_eq!(instantiated.load(Ordering::SeqCst), 0);
    }
}
