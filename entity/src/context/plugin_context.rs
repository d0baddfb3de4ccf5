//! The per-run facade handed to plugins.

use super::PipelineState;
use crate::core::{ConversationEntry, FailureInfo, PipelineStage};
use crate::errors::{ContextError, ToolError};
use crate::registry::ResourceRegistry;
use crate::resources::Resource;
use crate::tools::{ToolCall, ToolExecutor};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What a plugin sees of the current run.
///
/// Owns the run's [`PipelineState`] and shares the resource and tool layers
/// with every other run.
pub struct PluginContext {
    state: PipelineState,
    resources: Arc<ResourceRegistry>,
    tools: Arc<ToolExecutor>,
    user_id: String,
    current_plugin: Option<String>,
    enforce_output_stage: bool,
}

impl PluginContext {
    /// Creates a context over a fresh or seeded state.
    #[must_use]
    pub fn new(
        state: PipelineState,
        resources: Arc<ResourceRegistry>,
        tools: Arc<ToolExecutor>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            state,
            resources,
            tools,
            user_id: user_id.into(),
            current_plugin: None,
            enforce_output_stage: true,
        }
    }

    /// Controls whether `say` is restricted to the OUTPUT and ERROR stages.
    #[must_use]
    pub fn with_say_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_output_stage = enforce;
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        self.state.pipeline_id()
    }

    /// Returns the user the run belongs to.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the executing stage.
    #[must_use]
    pub fn current_stage(&self) -> PipelineStage {
        self.state.current_stage
    }

    /// Returns the executing plugin's name.
    #[must_use]
    pub fn current_plugin(&self) -> Option<&str> {
        self.current_plugin.as_deref()
    }

    pub(crate) fn set_current_stage(&mut self, stage: PipelineStage) {
        self.state.current_stage = stage;
    }

    pub(crate) fn set_current_plugin(&mut self, name: Option<&str>) {
        self.current_plugin = name.map(str::to_string);
    }

    /// Returns the run state.
    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    /// Consumes the context, returning the run state.
    #[must_use]
    pub fn into_state(self) -> PipelineState {
        self.state
    }

    // --- conversation ---

    /// Returns the conversation in append order.
    #[must_use]
    pub fn conversation(&self) -> &[ConversationEntry] {
        self.state.conversation()
    }

    /// Appends an entry to the conversation.
    pub fn add_conversation_entry(&mut self, entry: ConversationEntry) {
        self.state.conversation.push(entry);
    }

    /// Replaces the whole conversation. Intended for summarization and debugging.
    pub fn replace_conversation_history(&mut self, history: Vec<ConversationEntry>) {
        debug!(
            pipeline_id = %self.state.pipeline_id,
            old_len = self.state.conversation.len(),
            new_len = history.len(),
            "Conversation history replaced"
        );
        self.state.conversation = history;
    }

    /// Returns the most recent user message.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.state.last_user_message()
    }

    // --- stage results ---

    /// Returns a stage result.
    #[must_use]
    pub fn stage_result(&self, key: &str) -> Option<&Value> {
        self.state.stage_results.get(key)
    }

    /// Stores a stage result, evicting the oldest entry when full.
    pub fn set_stage_result(&mut self, key: impl Into<String>, value: Value) {
        if let Some((evicted, _)) = self.state.stage_results.insert(key, value) {
            debug!(pipeline_id = %self.state.pipeline_id, evicted = %evicted, "Stage result evicted");
        }
    }

    /// Returns true if a stage result exists.
    #[must_use]
    pub fn has_stage_result(&self, key: &str) -> bool {
        self.state.stage_results.contains(key)
    }

    // --- metadata ---

    /// Returns a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.state.metadata.get(key)
    }

    /// Sets a metadata value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.state.metadata.insert(key.into(), value);
    }

    /// Returns the plugin failure being handled, during the ERROR stage.
    #[must_use]
    pub fn failure_info(&self) -> Option<&FailureInfo> {
        self.state.failure_info()
    }

    // --- resources ---

    /// Returns a resource by name. Callers must handle `None`.
    #[must_use]
    pub fn get_resource(&self, name: &str) -> Option<Arc<dyn Resource>> {
        self.resources.get(name)
    }

    /// Returns the resource registry.
    #[must_use]
    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    /// Stores a value in memory under a key namespaced by user.
    pub async fn remember(&self, key: &str, value: Value) -> Result<(), ContextError> {
        let resource = self.resources.memory().ok_or(ContextError::NoMemory)?;
        let memory = resource.as_memory().ok_or(ContextError::NoMemory)?;
        memory
            .remember(&self.namespaced(key), value)
            .await
            .map_err(|e| ContextError::Memory(e.to_string()))
    }

    /// Loads a user-namespaced value, or `default` if nothing is stored.
    pub async fn recall(&self, key: &str, default: Value) -> Result<Value, ContextError> {
        let resource = self.resources.memory().ok_or(ContextError::NoMemory)?;
        let memory = resource.as_memory().ok_or(ContextError::NoMemory)?;
        let stored = memory
            .recall(&self.namespaced(key))
            .await
            .map_err(|e| ContextError::Memory(e.to_string()))?;
        Ok(stored.unwrap_or(default))
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.user_id)
    }

    // --- tools ---

    /// Runs a tool now and returns its result.
    pub async fn tool_use(&mut self, name: &str, params: Value) -> Result<Value, ToolError> {
        let tools = self.tools.clone();
        tools
            .execute_immediate(&mut self.state, ToolCall::direct(name, params))
            .await
    }

    /// Queues a tool call to run after the current stage and returns the key
    /// its result will be stored under.
    pub fn queue_tool_use(&mut self, name: &str, params: Value) -> String {
        let call = ToolCall::queued(name, params);
        let key = call.result_key.clone();
        self.state.pending_tool_calls.push_back(call);
        key
    }

    /// Returns the number of queued tool calls.
    #[must_use]
    pub fn pending_tool_count(&self) -> usize {
        self.state.pending_tool_calls.len()
    }

    // --- response ---

    /// Sets the run's response.
    ///
    /// The response is write-once. When enforcement is on it may only be set
    /// during OUTPUT, or during ERROR by failure plugins.
    pub fn say(&mut self, response: impl Into<Value>) -> Result<(), ContextError> {
        if self.state.response.is_some() {
            return Err(ContextError::ResponseAlreadySet);
        }
        let stage = self.state.current_stage;
        if self.enforce_output_stage && !matches!(stage, PipelineStage::Output | PipelineStage::Error) {
            return Err(ContextError::SayOutsideOutput {
                stage: stage.to_string(),
            });
        }
        self.state.response = Some(response.into());
        Ok(())
    }

    /// Returns the response, if set.
    #[must_use]
    pub fn response(&self) -> Option<&Value> {
        self.state.response()
    }

    /// Returns true once a response has been set.
    #[must_use]
    pub fn has_response(&self) -> bool {
        self.state.response.is_some()
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("pipeline_id", &self.state.pipeline_id)
            .field("user_id", &self.user_id)
            .field("stage", &self.state.current_stage)
            .field("plugin", &self.current_plugin)
            .finish_non_exhaustive()
    }
}
