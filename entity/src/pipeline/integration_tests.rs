//! End-to-end tests across the initializer, executor and manager.

use super::*;
use crate::config::{RuntimeConfig, SystemConfig};
use crate::context::{PipelineState, PluginContext};
use crate::core::{response, PipelineStage, Role};
use crate::errors::{InitPhase, ToolError};
use crate::events::{CollectingEventSink, EventKind};
use crate::plugins::{BasicLogger, ErrorFormatter, Plugin, PluginKind, StaticFallback};
use crate::registry::{PluginClass, PluginFactoryRegistry, MEMORY, METRICS_COLLECTOR};
use crate::resources::metrics::names;
use crate::resources::{Cache, InMemoryCache, InMemoryMemory, MetricsCollector, Resource};
use crate::testing::{
    counting_plugin_class, echo_prompt_class, failing_resource_class, CalculatorTool,
    CountingTool, FailingPlugin, RecordingPlugin, RespondingPlugin, ToolQueuePlugin,
};
use crate::tools::{RetryOptions, Tool, ToolCall, ToolExecutor};
use async_trait::async_trait;
use mockall::mock;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn registries() -> Registries {
    let registries = Registries::new(RuntimeConfig::default());
    registries
        .resources
        .add(METRICS_COLLECTOR, Arc::new(MetricsCollector::default()));
    registries.resources.add(MEMORY, Arc::new(InMemoryMemory::new(MEMORY)));
    registries
}

fn register(registries: &Registries, plugin: Arc<dyn Plugin>) {
    for stage in plugin.stages().to_vec() {
        let name = plugin.name().to_string();
        registries.plugins.register_for_stage(Arc::clone(&plugin), stage, name);
    }
}

async fn run(registries: &Registries, message: &str) -> PipelineOutcome {
    let executor = PipelineExecutor::new(registries);
    executor.run(executor.new_state(message), "user-1").await
}

/// Calls a tool immediately with fixed parameters.
struct ImmediateToolPlugin {
    name: String,
    stages: Vec<PipelineStage>,
    tool: String,
    params: Value,
}

impl ImmediateToolPlugin {
    fn new(name: &str, stage: PipelineStage, tool: &str, params: Value) -> Self {
        Self {
            name: name.to_string(),
            stages: vec![stage],
            tool: tool.to_string(),
            params,
        }
    }
}

#[async_trait]
impl Plugin for ImmediateToolPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        let value = ctx.tool_use(&self.tool, self.params.clone()).await?;
        ctx.set_stage_result(self.name.clone(), value);
        Ok(())
    }
}

/// Asks for another pass until the user message is `done`.
struct ContinuePlugin {
    stages: Vec<PipelineStage>,
    runs: Arc<AtomicUsize>,
    stop_at: Option<&'static str>,
}

#[async_trait]
impl Plugin for ContinuePlugin {
    fn name(&self) -> &str {
        "continue"
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let last = ctx.last_user_message().unwrap_or_default().to_string();
        if self.stop_at == Some(last.as_str()) {
            ctx.say(json!({"content": format!("finished after {last}")}))?;
        } else {
            ctx.say(json!({"type": response::CONTINUE_PROCESSING, "message": "done"}))?;
        }
        Ok(())
    }
}

/// Opts out of every run.
struct NeverPlugin;

#[async_trait]
impl Plugin for NeverPlugin {
    fn name(&self) -> &str {
        "never"
    }

    fn stages(&self) -> &[PipelineStage] {
        &[PipelineStage::Review]
    }

    fn should_execute(&self, _ctx: &PluginContext) -> bool {
        false
    }

    async fn execute(&self, _ctx: &mut PluginContext) -> anyhow::Result<()> {
        anyhow::bail!("should never run")
    }
}

/// Panics inside `execute` on every stage it is registered for.
struct PanickingPlugin {
    name: String,
    stages: Vec<PipelineStage>,
}

impl PanickingPlugin {
    fn new(name: &str, stage: PipelineStage) -> Self {
        Self {
            name: name.to_string(),
            stages: vec![stage],
        }
    }
}

#[async_trait]
impl Plugin for PanickingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, _ctx: &mut PluginContext) -> anyhow::Result<()> {
        panic!("{} lost its footing", self.name)
    }
}

/// A tool whose body panics.
struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "unstable"
    }

    fn retry_options(&self) -> RetryOptions {
        RetryOptions::none()
    }

    async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
        panic!("unstable tool gave up")
    }
}

mock! {
    pub ToolCache {}

    #[async_trait]
    impl Cache for ToolCache {
        async fn get(&self, key: &str) -> Option<Value>;
        async fn set(&self, key: &str, value: Value, ttl: Option<Duration>);
        async fn delete(&self, key: &str);
        async fn clear(&self);
    }
}

struct MockCacheResource(MockToolCache);

#[async_trait]
impl Resource for MockCacheResource {
    fn name(&self) -> &str {
        "cache"
    }

    fn as_cache(&self) -> Option<&dyn Cache> {
        Some(&self.0)
    }
}

// --- stage ordering ---

#[tokio::test]
async fn test_plugins_run_in_stage_order_regardless_of_registration_order() {
    let registries = registries();
    let log = RecordingPlugin::shared_log();
    let plan = [
        ("out", PipelineStage::Output),
        ("review", PipelineStage::Review),
        ("input", PipelineStage::Input),
        ("think_b", PipelineStage::Think),
        ("do", PipelineStage::Do),
        ("think_a", PipelineStage::Think),
        ("parse", PipelineStage::Parse),
    ];
    for (name, stage) in plan {
        register(&registries, Arc::new(RecordingPlugin::new(name, vec![stage], log.clone())));
    }

    for _ in 0..3 {
        log.lock().clear();
        run(&registries, "hi").await;
        assert_eq!(
            *log.lock(),
            vec![
                "INPUT:input",
                "PARSE:parse",
                "THINK:think_b",
                "THINK:think_a",
                "DO:do",
                "REVIEW:review",
                "OUTPUT:out",
            ]
        );
    }
}

#[tokio::test]
async fn test_multi_stage_plugin_runs_once_per_stage() {
    let registries = registries();
    let log = RecordingPlugin::shared_log();
    register(
        &registries,
        Arc::new(RecordingPlugin::new(
            "adapter",
            vec![PipelineStage::Input, PipelineStage::Output],
            log.clone(),
        )),
    );

    run(&registries, "hi").await;
    assert_eq!(*log.lock(), vec!["INPUT:adapter", "OUTPUT:adapter"]);
}

// --- write-once response ---

#[tokio::test]
async fn test_second_say_is_a_contract_violation() {
    let registries = registries();
    register(&registries, Arc::new(RespondingPlugin::new("first", PipelineStage::Output, json!("one"))));
    register(&registries, Arc::new(RespondingPlugin::new("second", PipelineStage::Output, json!("two"))));

    let outcome = run(&registries, "hi").await;

    let failure = outcome.state.failure_info().unwrap();
    assert_eq!(failure.plugin_name, "second");
    assert_eq!(failure.error_type, "ContextError");
    assert!(failure.error_message.contains("already been set"));
    // ERROR discards the partial response and no handler replaced it.
    assert_eq!(response::response_type(&outcome.response), Some(response::STATIC_FALLBACK));
}

#[tokio::test]
async fn test_say_outside_output_is_rejected() {
    let registries = registries();
    register(&registries, Arc::new(RespondingPlugin::new("eager", PipelineStage::Think, json!("early"))));

    let outcome = run(&registries, "hi").await;

    let failure = outcome.state.failure_info().unwrap();
    assert_eq!(failure.stage, PipelineStage::Think);
    assert!(failure.error_message.contains("OUTPUT"));
}

#[tokio::test]
async fn test_say_enforcement_can_be_disabled() {
    let mut registries = registries();
    registries.runtime.enforce_output_stage_for_say = false;
    register(&registries, Arc::new(RespondingPlugin::new("eager", PipelineStage::Think, json!("early"))));

    let outcome = run(&registries, "hi").await;
    assert_eq!(outcome.response, json!("early"));
}

// --- tools ---

#[tokio::test]
async fn test_queued_tools_fold_results_in_call_order() {
    let registries = registries();
    registries.tools.register(Arc::new(CalculatorTool::new()));
    register(
        &registries,
        Arc::new(ToolQueuePlugin::new(
            "think",
            PipelineStage::Think,
            "calc",
            vec![
                json!({"expression": "2+2", "delay_ms": 40}),
                json!({"expression": "3+3"}),
            ],
        )),
    );

    let outcome = run(&registries, "compute").await;

    let system: Vec<&str> = outcome
        .state
        .conversation()
        .iter()
        .filter(|e| e.role == Role::System)
        .map(|e| e.content.as_str())
        .collect();
    assert_eq!(system, vec!["Tool result: 4", "Tool result: 6"]);

    let keys = outcome.state.stage_results().get("think_keys").unwrap().clone();
    let keys: Vec<String> = serde_json::from_value(keys).unwrap();
    assert_eq!(outcome.state.stage_results().get(&keys[0]), Some(&json!(4)));
    assert_eq!(outcome.state.stage_results().get(&keys[1]), Some(&json!(6)));
    assert_eq!(outcome.report.tool_calls, 2);
}

#[tokio::test]
async fn test_queued_tool_failure_does_not_abort_the_run() {
    let registries = registries();
    registries.tools.register(Arc::new(CalculatorTool::new()));
    register(
        &registries,
        Arc::new(ToolQueuePlugin::new(
            "think",
            PipelineStage::Think,
            "calc",
            vec![json!({"expression": "1/0"})],
        )),
    );
    register(&registries, Arc::new(RespondingPlugin::new("out", PipelineStage::Output, json!("fine"))));

    let outcome = run(&registries, "compute").await;

    assert_eq!(outcome.response, json!("fine"));
    assert!(outcome.state.failure_info().is_none());
    assert_eq!(outcome.state.tool_failures().len(), 1);
    assert!(outcome
        .state
        .conversation()
        .iter()
        .any(|e| e.content.starts_with("Tool result: Error: ")));
}

#[tokio::test]
async fn test_immediate_tool_failure_routes_to_error() {
    let registries = registries();
    registries.tools.register(Arc::new(CalculatorTool::new()));
    register(
        &registries,
        Arc::new(ImmediateToolPlugin::new("doer", PipelineStage::Do, "calc", json!({"expression": "1/0"}))),
    );
    register(&registries, Arc::new(ErrorFormatter::new("formatter")));

    let outcome = run(&registries, "compute").await;

    assert_eq!(response::response_type(&outcome.response), Some(response::PLUGIN_ERROR));
    assert_eq!(outcome.response["plugin"], "doer");
    assert_eq!(outcome.response["stage"], "DO");
    assert!(outcome.state.failure_info().is_some());
    assert_eq!(outcome.state.tool_failures().len(), 1);
    let mut failures = 0;
    registries.resources.with_metrics(|m| failures = m.counter(names::TOOL_FAILURES));
    assert_eq!(failures, 1);
}

#[tokio::test]
async fn test_cached_tool_runs_once_for_identical_params() {
    let registries = registries();
    registries.resources.add("cache", Arc::new(InMemoryCache::new("cache")));
    let counting = Arc::new(CountingTool::new("lookup"));
    registries.tools.register(counting.clone());
    let params = json!({"q": "rust", "limit": 3});
    register(&registries, Arc::new(ImmediateToolPlugin::new("a", PipelineStage::Think, "lookup", params.clone())));
    register(&registries, Arc::new(ImmediateToolPlugin::new("b", PipelineStage::Do, "lookup", params)));

    let outcome = run(&registries, "search").await;

    assert_eq!(counting.calls(), 1);
    assert_eq!(outcome.state.stage_results().get("a"), outcome.state.stage_results().get("b"));
    let mut hits = 0;
    registries.resources.with_metrics(|m| hits = m.counter(names::TOOL_CACHE_HITS));
    assert_eq!(hits, 1);
}

#[tokio::test]
async fn test_cache_resource_is_consulted_through_its_interface() {
    let mut cache = MockToolCache::new();
    cache.expect_get().times(1).returning(|_| None);
    cache
        .expect_set()
        .withf(|key, value, ttl| key.starts_with("tool:") && *value == json!(4) && ttl.is_none())
        .times(1)
        .return_const(());

    let registries = registries();
    registries.resources.add("cache", Arc::new(MockCacheResource(cache)));
    registries.tools.register(Arc::new(CalculatorTool::new()) as Arc<dyn Tool>);
    let executor = ToolExecutor::new(registries.tools.clone(), registries.resources.clone());

    let value = executor
        .execute_call("run", &ToolCall::direct("calc", json!({"expression": "2+2"})))
        .await
        .unwrap();
    assert_eq!(value, json!(4));
}

#[tokio::test]
async fn test_unknown_tool_is_reported_to_the_plugin() {
    let registries = registries();
    let executor = PipelineExecutor::new(&registries);
    let mut state = executor.new_state("x");
    state.current_stage = PipelineStage::Do;
    let tools = Arc::new(ToolExecutor::new(registries.tools.clone(), registries.resources.clone()));
    let mut ctx = PluginContext::new(state, registries.resources.clone(), tools, "u");

    let err = ctx.tool_use("missing", json!({})).await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound { ref name } if name == "missing"));
}

// --- ERROR stage ---

#[tokio::test]
async fn test_plugin_failure_routes_to_error_with_static_fallback() {
    let registries = registries();
    let log = RecordingPlugin::shared_log();
    register(&registries, Arc::new(FailingPlugin::new("explode", PipelineStage::Do, "boom")));
    register(&registries, Arc::new(RecordingPlugin::new("late", vec![PipelineStage::Output], log.clone())));
    register(&registries, Arc::new(BasicLogger::new("logger")));
    register(&registries, Arc::new(StaticFallback::new("fallback")));

    let outcome = run(&registries, "hi").await;

    assert_eq!(outcome.response["type"], "static_fallback");
    assert_eq!(outcome.response["error_id"], outcome.state.pipeline_id());
    assert!(log.lock().is_empty());

    let failure = outcome.state.failure_info().unwrap();
    assert_eq!(failure.stage, PipelineStage::Do);
    assert_eq!(failure.plugin_name, "explode");
    assert_eq!(failure.error_message, "boom");
    assert!(outcome.report.failed);
    assert_eq!(outcome.state.current_stage(), PipelineStage::Error);
}

#[tokio::test]
async fn test_panicking_plugin_routes_to_error() {
    let registries = registries();
    let log = RecordingPlugin::shared_log();
    register(&registries, Arc::new(PanickingPlugin::new("fragile", PipelineStage::Do)));
    register(&registries, Arc::new(RecordingPlugin::new("late", vec![PipelineStage::Output], log.clone())));
    register(&registries, Arc::new(ErrorFormatter::new("formatter")));

    let outcome = run(&registries, "hi").await;

    assert_eq!(outcome.response["type"], "plugin_error");
    assert_eq!(outcome.response["plugin"], "fragile");
    assert!(log.lock().is_empty());

    let failure = outcome.state.failure_info().unwrap();
    assert_eq!(failure.stage, PipelineStage::Do);
    assert_eq!(failure.plugin_name, "fragile");
    assert_eq!(failure.error_message, "plugin panicked: fragile lost its footing");
    assert!(outcome.report.failed);
}

#[tokio::test]
async fn test_panicking_error_plugin_does_not_stop_the_next() {
    let registries = registries();
    register(&registries, Arc::new(FailingPlugin::new("explode", PipelineStage::Think, "boom")));
    register(&registries, Arc::new(PanickingPlugin::new("fragile_handler", PipelineStage::Error)));
    register(&registries, Arc::new(ErrorFormatter::new("formatter")));

    let outcome = run(&registries, "hi").await;

    assert_eq!(outcome.response["type"], "plugin_error");
    assert_eq!(outcome.response["plugin"], "explode");
    assert_eq!(outcome.response["message"], "boom");
}

#[tokio::test]
async fn test_panicking_queued_tool_degrades_to_inline_error() {
    let registries = registries();
    registries.tools.register(Arc::new(PanickingTool));
    register(
        &registries,
        Arc::new(ToolQueuePlugin::new("think", PipelineStage::Think, "unstable", vec![json!({})])),
    );
    register(&registries, Arc::new(RespondingPlugin::new("out", PipelineStage::Output, json!("still here"))));

    let outcome = run(&registries, "compute").await;

    assert_eq!(outcome.response, json!("still here"));
    assert!(outcome.state.failure_info().is_none());
    assert_eq!(outcome.state.tool_failures().len(), 1);
    assert!(outcome.state.tool_failures()[0]
        .error_message
        .contains("tool panicked: unstable tool gave up"));
    assert!(outcome
        .state
        .conversation()
        .iter()
        .any(|e| e.content.starts_with("Tool result: Error: ")));
}

#[tokio::test]
async fn test_failing_error_plugin_does_not_stop_the_next() {
    let registries = registries();
    register(&registries, Arc::new(FailingPlugin::new("explode", PipelineStage::Think, "boom")));
    register(&registries, Arc::new(FailingPlugin::new("broken_handler", PipelineStage::Error, "also broken")));
    register(&registries, Arc::new(ErrorFormatter::new("formatter")));

    let outcome = run(&registries, "hi").await;

    assert_eq!(outcome.response["type"], "plugin_error");
    assert_eq!(outcome.response["plugin"], "explode");
    assert_eq!(outcome.response["message"], "boom");
}

#[tokio::test]
async fn test_failure_without_error_plugins_returns_static_fallback() {
    let registries = registries();
    register(&registries, Arc::new(FailingPlugin::new("explode", PipelineStage::Input, "bad input")));

    let outcome = run(&registries, "hi").await;

    assert_eq!(outcome.response["type"], "static_fallback");
    assert_eq!(outcome.response["message"], "bad input");
}

// --- skipping, reporting, events ---

#[tokio::test]
async fn test_skipped_stage_is_reported() {
    let registries = registries();
    let events = Arc::new(CollectingEventSink::new());
    register(&registries, Arc::new(NeverPlugin));
    register(&registries, Arc::new(RespondingPlugin::new("out", PipelineStage::Output, json!("ok"))));

    let executor = PipelineExecutor::new(&registries).with_event_sink(events.clone());
    let outcome = executor.run(executor.new_state("hi"), "u").await;

    assert_eq!(outcome.report.stages_skipped, vec![PipelineStage::Review]);
    assert_eq!(outcome.report.stages_executed, vec![PipelineStage::Output]);
    assert_eq!(outcome.report.plugins_skipped, 1);
    assert_eq!(events.of_kind(EventKind::StageSkipped).len(), 1);

    let stored: ExecutionReport =
        serde_json::from_value(outcome.state.metadata()[EXECUTION_REPORT_KEY].clone()).unwrap();
    assert_eq!(stored.plugins_run, 1);
}

#[tokio::test]
async fn test_events_bracket_the_run() {
    let registries = registries();
    let events = Arc::new(CollectingEventSink::new());
    registries.tools.register(Arc::new(CalculatorTool::new()));
    register(
        &registries,
        Arc::new(ToolQueuePlugin::new("think", PipelineStage::Think, "calc", vec![json!({"expression": "1+1"})])),
    );
    register(&registries, Arc::new(RespondingPlugin::new("out", PipelineStage::Output, json!("ok"))));

    let executor = PipelineExecutor::new(&registries).with_event_sink(events.clone());
    executor.execute("hi", "u").await;

    let kinds = events.kinds();
    assert_eq!(kinds.first(), Some(&EventKind::PipelineStarted));
    assert_eq!(kinds.last(), Some(&EventKind::PipelineCompleted));
    assert_eq!(events.of_kind(EventKind::ToolCompleted).len(), 1);
    assert_eq!(events.of_kind(EventKind::StageCompleted).len(), 2);
}

// --- conversation manager ---

#[tokio::test]
async fn test_manager_follows_continue_and_saves_history() {
    let registries = registries();
    let runs = Arc::new(AtomicUsize::new(0));
    register(
        &registries,
        Arc::new(ContinuePlugin {
            stages: vec![PipelineStage::Output],
            runs: runs.clone(),
            stop_at: Some("done"),
        }),
    );

    let manager = ConversationManager::new(&registries);
    let response = manager.process("start", "alice").await;

    assert_eq!(response, json!({"content": "finished after done"}));
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    let memory = registries.resources.memory().unwrap();
    let history = memory.as_memory().unwrap().load_conversation("alice").await.unwrap();
    let turns: Vec<(Role, &str)> = history.iter().map(|e| (e.role, e.content.as_str())).collect();
    assert_eq!(
        turns,
        vec![
            (Role::User, "start"),
            (Role::User, "done"),
            (Role::Assistant, "finished after done"),
        ]
    );

    // The next message sees the saved history.
    manager.process("done", "alice").await;
    let history = memory.as_memory().unwrap().load_conversation("alice").await.unwrap();
    assert_eq!(history.len(), 5);
}

#[tokio::test]
async fn test_manager_stops_at_iteration_limit() {
    let registries = registries();
    let runs = Arc::new(AtomicUsize::new(0));
    register(
        &registries,
        Arc::new(ContinuePlugin {
            stages: vec![PipelineStage::Output],
            runs: runs.clone(),
            stop_at: None,
        }),
    );

    let manager = ConversationManager::new(&registries).with_max_iterations(3);
    let response = manager.process("go", "bob").await;

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(response::continue_message(&response), Some("done"));
}

// --- startup ---

fn factories() -> PluginFactoryRegistry {
    let mut factories = PluginFactoryRegistry::with_defaults();
    factories.register(echo_prompt_class("prompt.echo"));
    factories.register(PluginClass::tool("tool.calc", |_| Ok(Arc::new(CalculatorTool::new()))));
    factories.register(failing_resource_class("test.failing"));
    factories
}

#[tokio::test]
async fn test_echo_workflow_from_config() {
    let config = SystemConfig::from_json_str(
        r#"{
            "resources": {
                "memory": {"type": "memory.in_memory"},
                "llm": {"type": "llm.echo"},
                "storage": {"type": "storage.in_memory"}
            },
            "prompts": {"echo": {"type": "prompt.echo"}},
            "workflow": {"THINK": ["echo"], "OUTPUT": ["echo"]}
        }"#,
    )
    .unwrap();

    let registries = SystemInitializer::new(config, factories()).initialize().await.unwrap();
    let response = execute_pipeline("hello", &registries).await;

    assert_eq!(response["content"], "hello");
    assert!(registries.shutdown().await.is_clean());
}

#[tokio::test(start_paused = true)]
async fn test_failing_resource_aborts_startup_before_plugins() {
    let built = Arc::new(AtomicUsize::new(0));
    let mut factories = factories();
    factories.register(counting_plugin_class("prompt.counting", PluginKind::Prompt, built.clone()));
    let config = SystemConfig::from_json_str(
        r#"{
            "resources": {
                "memory": {"type": "memory.in_memory"},
                "llm": {"type": "llm.echo"},
                "storage": {"type": "storage.in_memory"}
            },
            "custom_resources": {"vector_db": {"type": "test.failing"}},
            "tools": {"calc": {"type": "tool.calc"}},
            "prompts": {"counted": {"type": "prompt.counting"}},
            "runtime": {"breaker": {"failure_threshold": 2, "recovery_timeout_secs": 30}}
        }"#,
    )
    .unwrap();

    let err = SystemInitializer::new(config, factories).initialize().await.unwrap_err();

    assert_eq!(err.phase, InitPhase::Resources);
    assert_eq!(err.plugin.as_deref(), Some("vector_db"));
    assert_eq!(err.message, VALIDATION_FAILED_MESSAGE);
    let info = err.error_info.unwrap();
    assert!(info.context["last_error"].contains("connection refused"));
    assert_eq!(built.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_state_seeded_with_history() {
    let registries = registries();
    register(&registries, Arc::new(crate::testing::EchoPrompt::new("echo", vec![PipelineStage::Output])));
    let executor = PipelineExecutor::new(&registries);
    let state = PipelineState::default()
        .with_history(vec![crate::core::ConversationEntry::user("earlier")])
        .with_user_message("latest");

    let outcome = executor.run(state, "u").await;
    assert_eq!(outcome.response["content"], "latest");
    assert_eq!(outcome.state.conversation().len(), 2);
}
