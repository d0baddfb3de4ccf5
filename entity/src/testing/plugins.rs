//! Fake stage plugins.

use crate::context::PluginContext;
use crate::core::PipelineStage;
use crate::plugins::{Plugin, PluginKind};
use crate::registry::PluginClass;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared, ordered log of `"STAGE:name"` entries.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

/// Appends `"STAGE:name"` to a shared log on every execution.
#[derive(Debug)]
pub struct RecordingPlugin {
    name: String,
    stages: Vec<PipelineStage>,
    log: ExecutionLog,
}

impl RecordingPlugin {
    /// Creates a recording plugin.
    #[must_use]
    pub fn new(name: impl Into<String>, stages: Vec<PipelineStage>, log: ExecutionLog) -> Self {
        Self {
            name: name.into(),
            stages,
            log,
        }
    }

    /// Creates an empty log to share between plugins.
    #[must_use]
    pub fn shared_log() -> ExecutionLog {
        Arc::new(Mutex::new(Vec::new()))
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        self.log.lock().push(format!("{}:{}", ctx.current_stage(), self.name));
        Ok(())
    }
}

/// Always fails with the configured message.
#[derive(Debug)]
pub struct FailingPlugin {
    name: String,
    stages: Vec<PipelineStage>,
    message: String,
}

impl FailingPlugin {
    /// Creates a plugin that fails in `stage`.
    #[must_use]
    pub fn new(name: impl Into<String>, stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: vec![stage],
            message: message.into(),
        }
    }
}

#[async_trait]
impl Plugin for FailingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, _ctx: &mut PluginContext) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("{}", self.message))
    }
}

/// Sets a fixed response.
#[derive(Debug)]
pub struct RespondingPlugin {
    name: String,
    stages: Vec<PipelineStage>,
    response: Value,
}

impl RespondingPlugin {
    /// Creates a plugin that says `response` in `stage`.
    #[must_use]
    pub fn new(name: impl Into<String>, stage: PipelineStage, response: Value) -> Self {
        Self {
            name: name.into(),
            stages: vec![stage],
            response,
        }
    }
}

#[async_trait]
impl Plugin for RespondingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        ctx.say(self.response.clone())?;
        Ok(())
    }
}

/// Queues one call to `tool` per parameter set.
#[derive(Debug)]
pub struct ToolQueuePlugin {
    name: String,
    stages: Vec<PipelineStage>,
    tool: String,
    calls: Vec<Value>,
}

impl ToolQueuePlugin {
    /// Creates a plugin that queues `calls` in `stage`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        stage: PipelineStage,
        tool: impl Into<String>,
        calls: Vec<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            stages: vec![stage],
            tool: tool.into(),
            calls,
        }
    }
}

#[async_trait]
impl Plugin for ToolQueuePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        let keys: Vec<String> = self
            .calls
            .iter()
            .map(|params| ctx.queue_tool_use(&self.tool, params.clone()))
            .collect();
        ctx.set_stage_result(format!("{}_keys", self.name), json!(keys));
        Ok(())
    }
}

/// Echoes the last user message.
///
/// In THINK it stores the message under `echo`; in OUTPUT it responds with
/// `{"content": <message>}`.
#[derive(Debug)]
pub struct EchoPrompt {
    name: String,
    stages: Vec<PipelineStage>,
}

impl EchoPrompt {
    /// Creates an echo prompt for the given stages.
    #[must_use]
    pub fn new(name: impl Into<String>, stages: Vec<PipelineStage>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }
}

#[async_trait]
impl Plugin for EchoPrompt {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        let message = ctx.last_user_message().unwrap_or_default().to_string();
        if ctx.current_stage() == PipelineStage::Output {
            let content = ctx
                .stage_result("echo")
                .and_then(Value::as_str)
                .map_or(message, str::to_string);
            ctx.say(json!({ "content": content }))?;
        } else {
            ctx.set_stage_result("echo", json!(message));
        }
        Ok(())
    }
}

/// A class building [`EchoPrompt`]s.
#[must_use]
pub fn echo_prompt_class(id: &str) -> PluginClass {
    PluginClass::plugin(id, PluginKind::Prompt, |setup| {
        Ok(Arc::new(EchoPrompt::new(&setup.name, setup.stages.clone())))
    })
}

/// A class building [`RecordingPlugin`]s that counts every instantiation.
#[must_use]
pub fn counting_plugin_class(id: &str, kind: PluginKind, counter: Arc<AtomicUsize>) -> PluginClass {
    PluginClass::plugin(id, kind, move |setup| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingPlugin::new(
            &setup.name,
            setup.stages.clone(),
            RecordingPlugin::shared_log(),
        )))
    })
}
