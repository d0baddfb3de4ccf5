//! Tool execution: validation, caching, retries, sandboxing, and metrics.

use super::{schema, SandboxRunner, Tool, ToolCall, ToolRegistry};
use crate::context::PipelineState;
use crate::core::{ConversationEntry, FailureInfo};
use crate::errors::ToolError;
use crate::events::{EventKind, EventSink, NoOpEventSink, PipelineEvent};
use crate::registry::ResourceRegistry;
use crate::reliability::RetryPolicy;
use crate::resources::metrics::names;
use futures::future::join_all;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Derives the cache key for a call: sha256 over the tool name and the
/// parameters serialized with sorted keys.
#[must_use]
pub fn cache_key(tool_name: &str, params: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(params).as_bytes());
    format!("tool:{}", hex::encode(hasher.finalize()))
}

fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::from(k.as_str()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// Renders a tool result for the conversation: strings verbatim, everything else as JSON.
#[must_use]
pub fn render_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Executes tool calls on behalf of plugins.
///
/// Every call goes through the same path: input validation, cache lookup,
/// a concurrency permit, the tool's own retry policy around a sandboxed
/// attempt, output validation, then metrics and cache population.
pub struct ToolExecutor {
    tools: Arc<ToolRegistry>,
    resources: Arc<ResourceRegistry>,
    sandbox: SandboxRunner,
    permits: Option<Arc<Semaphore>>,
    events: Arc<dyn EventSink>,
}

impl ToolExecutor {
    /// Creates an executor sized from the registry's concurrency limit.
    #[must_use]
    pub fn new(tools: Arc<ToolRegistry>, resources: Arc<ResourceRegistry>) -> Self {
        let permits = tools
            .concurrency_limit()
            .map(|limit| Arc::new(Semaphore::new(limit)));
        Self {
            tools,
            resources,
            sandbox: SandboxRunner::default(),
            permits,
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sandbox limits.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxRunner) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the tool registry.
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Runs one call and returns its result.
    pub async fn execute_call(&self, pipeline_id: &str, call: &ToolCall) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::not_found(&call.name))?;

        if let Some(input_schema) = tool.input_schema() {
            schema::validate(input_schema, &call.params)
                .map_err(|reason| ToolError::invalid_input(&call.name, reason))?;
        }

        let key = cache_key(&call.name, &call.params);
        let cache = self.resources.cache();
        if let Some(hit) = match cache.as_deref().and_then(|r| r.as_cache()) {
            Some(cache) => cache.get(&key).await,
            None => None,
        } {
            debug!(tool = %call.name, "Tool cache hit");
            self.resources
                .with_metrics(|m| m.increment(names::TOOL_CACHE_HITS));
            self.emit(EventKind::ToolCacheHit, pipeline_id, call);
            return Ok(hit);
        }

        self.emit(EventKind::ToolInvoked, pipeline_id, call);
        let _permit = match &self.permits {
            Some(permits) => permits.acquire().await.ok(),
            None => None,
        };

        let started = Instant::now();
        let output = self.run_with_retry(tool.as_ref(), call).await;
        let elapsed = started.elapsed();

        self.resources.with_metrics(|m| {
            m.increment(names::TOOL_EXECUTIONS);
            m.record_duration(names::TOOL_DURATION, elapsed);
        });

        let output = output?;
        if let Some(output_schema) = tool.output_schema() {
            schema::validate(output_schema, &output)
                .map_err(|reason| ToolError::invalid_output(&call.name, reason))?;
        }

        if let Some(cache) = cache.as_deref().and_then(|r| r.as_cache()) {
            cache.set(&key, output.clone(), None).await;
        }
        self.emit(EventKind::ToolCompleted, pipeline_id, call);
        Ok(output)
    }

    async fn run_with_retry(&self, tool: &dyn Tool, call: &ToolCall) -> Result<Value, ToolError> {
        let options = tool.retry_options();
        let policy = RetryPolicy::constant(options.attempts(), options.delay());

        policy
            .execute(|| self.sandbox.run(tool, call.params.clone()))
            .await
            .map_err(|err| match err {
                ToolError::ExecutionFailed { name, source, .. } => {
                    ToolError::execution_failed(name, options.attempts(), source)
                }
                other => other,
            })
    }

    /// Runs an immediate call and stores its result under the call's key.
    ///
    /// A failure is recorded in the state's tool failures and returned to
    /// the caller, which decides whether it is fatal.
    pub async fn execute_immediate(
        &self,
        state: &mut PipelineState,
        call: ToolCall,
    ) -> Result<Value, ToolError> {
        let result = self.execute_call(&state.pipeline_id, &call).await;
        match &result {
            Ok(value) => {
                state.stage_results.insert(call.result_key, value.clone());
            }
            Err(err) => {
                warn!(tool = %call.name, error = %err, "Immediate tool call failed");
                self.resources
                    .with_metrics(|m| m.increment(names::TOOL_FAILURES));
                self.emit(EventKind::ToolFailed, &state.pipeline_id, &call);
                state
                    .tool_failures
                    .push(FailureInfo::from_tool_error(state.current_stage, err));
            }
        }
        result
    }

    /// Drains the queue, runs every call concurrently, and folds the results
    /// back into the state in call order.
    ///
    /// Each result lands in `stage_results[result_key]` and as a system
    /// conversation entry. A failed call stores `"Error: <message>"` instead
    /// and is recorded in the state's tool failures; the run continues.
    /// Returns the number of calls executed.
    pub async fn execute_pending(&self, state: &mut PipelineState) -> usize {
        let calls: Vec<ToolCall> = state.pending_tool_calls.drain(..).collect();
        if calls.is_empty() {
            return 0;
        }

        let pipeline_id = state.pipeline_id.clone();
        let results = join_all(calls.iter().map(|call| self.execute_call(&pipeline_id, call))).await;

        for (call, result) in calls.iter().zip(results) {
            let value = match result {
                Ok(value) => value,
                Err(err) => {
                    warn!(
                        pipeline_id = %pipeline_id,
                        tool = %call.name,
                        error = %err,
                        "Queued tool call failed"
                    );
                    self.resources
                        .with_metrics(|m| m.increment(names::TOOL_FAILURES));
                    self.emit(EventKind::ToolFailed, &pipeline_id, call);
                    state
                        .tool_failures
                        .push(FailureInfo::from_tool_error(state.current_stage, &err));
                    Value::String(format!("Error: {}", err.inline_message()))
                }
            };

            state.conversation.push(
                ConversationEntry::system(format!("Tool result: {}", render_result(&value)))
                    .with_metadata("tool_name", json!(call.name))
                    .with_metadata("result_key", json!(call.result_key)),
            );
            state.stage_results.insert(call.result_key.clone(), value);
        }

        calls.len()
    }

    fn emit(&self, kind: EventKind, pipeline_id: &str, call: &ToolCall) {
        self.events.try_emit(PipelineEvent::new(
            kind,
            pipeline_id,
            json!({"tool": call.name, "result_key": call.result_key}),
        ));
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("tools", &self.tools)
            .field("sandbox", &self.sandbox)
            .field("bounded", &self.permits.is_some())
            .finish_non_exhaustive()
    }
}
