//! The stage loop.
//!
//! Stages run in fixed order; plugins within a stage run one at a time in
//! registration order. Tools queued during a stage run together once the
//! stage's plugins finish. The first plugin failure ends the pass and hands
//! control to the ERROR stage.

use super::initializer::Registries;
use crate::config::RuntimeConfig;
use crate::context::{PipelineState, PluginContext};
use crate::core::{response, FailureInfo, PipelineStage};
use crate::errors::panic_message;
use crate::events::{EventKind, EventSink, NoOpEventSink, PipelineEvent};
use crate::registry::{PluginRegistry, ResourceRegistry};
use crate::plugins::Plugin;
use crate::tools::{SandboxRunner, ToolExecutor, ToolRegistry};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Metadata key under which the run's [`ExecutionReport`] is stored.
pub const EXECUTION_REPORT_KEY: &str = "execution_report";

/// Per-stage counts of plugins that ran and plugins that opted out.
#[derive(Debug, Clone, Default)]
pub struct StageSkipTracker {
    counts: BTreeMap<PipelineStage, (usize, usize)>,
}

impl StageSkipTracker {
    /// Records a plugin that ran.
    pub fn record_run(&mut self, stage: PipelineStage) {
        self.counts.entry(stage).or_default().0 += 1;
    }

    /// Records a plugin whose `should_execute` returned false.
    pub fn record_skip(&mut self, stage: PipelineStage) {
        self.counts.entry(stage).or_default().1 += 1;
    }

    /// Returns how many plugins ran in the stage.
    #[must_use]
    pub fn run_count(&self, stage: PipelineStage) -> usize {
        self.counts.get(&stage).map_or(0, |c| c.0)
    }

    /// Returns how many plugins skipped the stage.
    #[must_use]
    pub fn skip_count(&self, stage: PipelineStage) -> usize {
        self.counts.get(&stage).map_or(0, |c| c.1)
    }

    /// Returns true if the stage had plugins and every one of them skipped.
    #[must_use]
    pub fn all_skipped(&self, stage: PipelineStage) -> bool {
        self.skip_count(stage) > 0 && self.run_count(stage) == 0
    }

    /// Returns the totals across every stage as `(run, skipped)`.
    #[must_use]
    pub fn totals(&self) -> (usize, usize) {
        self.counts
            .values()
            .fold((0, 0), |(run, skipped), c| (run + c.0, skipped + c.1))
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Stages whose plugins ran, in order.
    pub stages_executed: Vec<PipelineStage>,
    /// Stages whose plugins all opted out.
    pub stages_skipped: Vec<PipelineStage>,
    /// Plugins that ran.
    pub plugins_run: usize,
    /// Plugins that opted out.
    pub plugins_skipped: usize,
    /// Queued tool calls executed.
    pub tool_calls: usize,
    /// Wall time of the run.
    pub duration_ms: f64,
    /// Whether the run went through the ERROR stage.
    pub failed: bool,
}

/// The result of [`PipelineExecutor::run`].
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The response returned to the caller.
    pub response: Value,
    /// The final run state.
    pub state: PipelineState,
    /// What happened during the run.
    pub report: ExecutionReport,
}

/// Runs pipelines against a fixed set of registries.
pub struct PipelineExecutor {
    plugins: Arc<PluginRegistry>,
    resources: Arc<ResourceRegistry>,
    tool_registry: Arc<ToolRegistry>,
    tools: Arc<ToolExecutor>,
    runtime: RuntimeConfig,
    events: Arc<dyn EventSink>,
}

impl PipelineExecutor {
    /// Creates an executor over initialized registries.
    #[must_use]
    pub fn new(registries: &Registries) -> Self {
        let events: Arc<dyn EventSink> = Arc::new(NoOpEventSink);
        Self {
            plugins: Arc::clone(&registries.plugins),
            resources: Arc::clone(&registries.resources),
            tool_registry: Arc::clone(&registries.tools),
            tools: Arc::new(build_tool_executor(
                &registries.tools,
                &registries.resources,
                &registries.runtime,
                &events,
            )),
            runtime: registries.runtime.clone(),
            events,
        }
    }

    /// Sets the event sink used by the stage loop and the tool executor.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.tools = Arc::new(build_tool_executor(
            &self.tool_registry,
            &self.resources,
            &self.runtime,
            &events,
        ));
        self.events = events;
        self
    }

    /// Returns the runtime config.
    #[must_use]
    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Starts a fresh state for one incoming message.
    #[must_use]
    pub fn new_state(&self, message: &str) -> PipelineState {
        PipelineState::new(self.runtime.max_stage_results).with_user_message(message)
    }

    /// Runs one message through the pipeline and returns the response.
    pub async fn execute(&self, message: &str, user_id: &str) -> Value {
        self.run(self.new_state(message), user_id).await.response
    }

    /// Runs the stage loop over `state`.
    ///
    /// Always produces a response: the one a plugin set, the ERROR stage's,
    /// a static fallback if the ERROR stage set nothing, or the no-response
    /// payload if OUTPUT finished without one.
    pub async fn run(&self, state: PipelineState, user_id: &str) -> PipelineOutcome {
        let started = Instant::now();
        let pipeline_id = state.pipeline_id().to_string();
        let mut tracker = StageSkipTracker::default();
        let mut report = ExecutionReport::default();
        let mut ctx = PluginContext::new(state, Arc::clone(&self.resources), Arc::clone(&self.tools), user_id)
            .with_say_enforcement(self.runtime.enforce_output_stage_for_say);

        info!(pipeline_id = %pipeline_id, user_id, "Pipeline started");
        self.emit(EventKind::PipelineStarted, &pipeline_id, json!({"user_id": user_id})).await;

        for stage in PipelineStage::ORDERED {
            if !self.run_stage(&mut ctx, stage, &mut tracker, &mut report).await {
                report.failed = true;
                break;
            }
        }

        if report.failed {
            self.run_error_stage(&mut ctx).await;
        }

        let response = match (ctx.response(), ctx.failure_info()) {
            (Some(response), _) => response.clone(),
            (None, Some(failure)) => response::static_fallback(&pipeline_id, &failure.error_message),
            (None, None) => {
                warn!(pipeline_id = %pipeline_id, "Pipeline finished without a response");
                response::no_response(&pipeline_id)
            }
        };

        let (plugins_run, plugins_skipped) = tracker.totals();
        report.plugins_run = plugins_run;
        report.plugins_skipped = plugins_skipped;
        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let mut state = ctx.into_state();
        state
            .metadata
            .insert(EXECUTION_REPORT_KEY.to_string(), serde_json::to_value(&report).unwrap_or_default());

        let kind = if report.failed {
            EventKind::PipelineFailed
        } else {
            EventKind::PipelineCompleted
        };
        self.emit(
            kind,
            &pipeline_id,
            json!({
                "duration_ms": report.duration_ms,
                "response_type": response::response_type(&response),
            }),
        )
        .await;
        info!(
            pipeline_id = %pipeline_id,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Pipeline finished"
        );

        PipelineOutcome {
            response,
            state,
            report,
        }
    }

    /// Runs one stage. Returns false if a plugin failed.
    async fn run_stage(
        &self,
        ctx: &mut PluginContext,
        stage: PipelineStage,
        tracker: &mut StageSkipTracker,
        report: &mut ExecutionReport,
    ) -> bool {
        ctx.set_current_stage(stage);
        let plugins = self.plugins.get_for_stage(stage);
        if plugins.is_empty() {
            return true;
        }

        let started = Instant::now();
        let pipeline_id = ctx.pipeline_id().to_string();
        self.emit(EventKind::StageStarted, &pipeline_id, json!({"stage": stage})).await;

        for registered in &plugins {
            if !registered.plugin.should_execute(ctx) {
                debug!(pipeline_id = %pipeline_id, %stage, plugin = %registered.name, "Plugin skipped");
                tracker.record_skip(stage);
                continue;
            }
            tracker.record_run(stage);
            ctx.set_current_plugin(Some(registered.name.as_str()));

            if let Err(e) = execute_guarded(registered.plugin.as_ref(), ctx).await {
                ctx.set_current_plugin(None);
                error!(
                    pipeline_id = %pipeline_id,
                    %stage,
                    plugin = %registered.name,
                    error = %e,
                    "Plugin failed"
                );
                let failure = FailureInfo::new(stage, &registered.name, &e)
                    .with_context_snapshot(ctx.state().snapshot());
                self.emit(
                    EventKind::PluginFailed,
                    &pipeline_id,
                    json!({"stage": stage, "plugin": registered.name, "error": failure.error_message}),
                )
                .await;
                ctx.state_mut().record_failure(failure);
                return false;
            }
        }
        ctx.set_current_plugin(None);

        if tracker.all_skipped(stage) {
            report.stages_skipped.push(stage);
            self.emit(EventKind::StageSkipped, &pipeline_id, json!({"stage": stage})).await;
            return true;
        }

        let tool_calls = self.tools.execute_pending(ctx.state_mut()).await;
        report.tool_calls += tool_calls;
        report.stages_executed.push(stage);

        self.emit(
            EventKind::StageCompleted,
            &pipeline_id,
            json!({
                "stage": stage,
                "plugins": tracker.run_count(stage),
                "tool_calls": tool_calls,
                "duration_ms": started.elapsed().as_secs_f64() * 1000.0,
            }),
        )
        .await;
        true
    }

    /// Runs every ERROR plugin. A failing ERROR plugin is logged and skipped.
    async fn run_error_stage(&self, ctx: &mut PluginContext) {
        ctx.set_current_stage(PipelineStage::Error);
        {
            let state = ctx.state_mut();
            state.response = None;
            state.pending_tool_calls.clear();
        }

        let pipeline_id = ctx.pipeline_id().to_string();
        let plugins = self.plugins.get_for_stage(PipelineStage::Error);
        self.emit(
            EventKind::StageStarted,
            &pipeline_id,
            json!({"stage": PipelineStage::Error, "plugins": plugins.len()}),
        )
        .await;

        for registered in &plugins {
            if !registered.plugin.should_execute(ctx) {
                continue;
            }
            ctx.set_current_plugin(Some(registered.name.as_str()));
            if let Err(e) = execute_guarded(registered.plugin.as_ref(), ctx).await {
                warn!(
                    pipeline_id = %pipeline_id,
                    plugin = %registered.name,
                    error = %e,
                    "Error handler failed; continuing"
                );
            }
        }
        ctx.set_current_plugin(None);
        ctx.state_mut().pending_tool_calls.clear();

        self.emit(EventKind::StageCompleted, &pipeline_id, json!({"stage": PipelineStage::Error}))
            .await;
    }

    async fn emit(&self, kind: EventKind, pipeline_id: &str, data: Value) {
        self.events.emit(PipelineEvent::new(kind, pipeline_id, data)).await;
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("plugins", &self.plugins)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

/// Runs one plugin, turning a panic into an ordinary failure.
async fn execute_guarded(plugin: &dyn Plugin, ctx: &mut PluginContext) -> anyhow::Result<()> {
    match AssertUnwindSafe(plugin.execute(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(
            "plugin panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}

fn build_tool_executor(
    tools: &Arc<ToolRegistry>,
    resources: &Arc<ResourceRegistry>,
    runtime: &RuntimeConfig,
    events: &Arc<dyn EventSink>,
) -> ToolExecutor {
    let mut sandbox = SandboxRunner::new(runtime.tool_timeout());
    if let Some(limit) = runtime.tool_max_output_bytes {
        sandbox = sandbox.with_max_output_bytes(limit);
    }
    ToolExecutor::new(Arc::clone(tools), Arc::clone(resources))
        .with_sandbox(sandbox)
        .with_event_sink(Arc::clone(events))
}

/// Runs one message through initialized registries.
///
/// This is the single entry point for transports.
pub async fn execute_pipeline(message: &str, registries: &Registries) -> Value {
    PipelineExecutor::new(registries).execute(message, "default").await
}
