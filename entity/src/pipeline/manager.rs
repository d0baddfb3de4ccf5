//! Multi-pass conversation handling on top of the executor.

use super::executor::PipelineExecutor;
use super::initializer::Registries;
use crate::context::PipelineState;
use crate::core::{response, ConversationEntry};
use crate::registry::ResourceRegistry;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Loads history, runs the pipeline, follows `continue_processing`
/// responses, and saves the conversation.
///
/// The conversation is keyed by user id. Without a memory resource every
/// message starts from an empty history.
#[derive(Debug)]
pub struct ConversationManager {
    executor: PipelineExecutor,
    resources: Arc<ResourceRegistry>,
    max_iterations: usize,
}

impl ConversationManager {
    /// Creates a manager with a default executor.
    #[must_use]
    pub fn new(registries: &Registries) -> Self {
        Self::with_executor(PipelineExecutor::new(registries), registries)
    }

    /// Creates a manager around a configured executor.
    #[must_use]
    pub fn with_executor(executor: PipelineExecutor, registries: &Registries) -> Self {
        Self {
            max_iterations: registries.runtime.max_iterations.max(1),
            executor,
            resources: Arc::clone(&registries.resources),
        }
    }

    /// Overrides the follow-up limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Processes one user message and returns the final response.
    pub async fn process(&self, message: &str, user_id: &str) -> Value {
        let mut history = self.load_history(user_id).await;
        let mut message = message.to_string();
        let mut iteration = 0;

        loop {
            iteration += 1;
            let state = PipelineState::new(self.executor.runtime().max_stage_results)
                .with_history(history)
                .with_user_message(message.as_str());
            let outcome = self.executor.run(state, user_id).await;
            history = outcome.state.conversation().to_vec();

            let follow_up = response::continue_message(&outcome.response).map(str::to_string);
            match follow_up {
                Some(next) if iteration < self.max_iterations => {
                    debug!(user_id, iteration, "Continuing with follow-up message");
                    message = next;
                }
                follow_up => {
                    if follow_up.is_some() {
                        warn!(user_id, iteration, "Follow-up limit reached");
                    }
                    history.push(
                        ConversationEntry::assistant(render_response(&outcome.response))
                            .with_metadata("pipeline_id", json!(outcome.state.pipeline_id())),
                    );
                    self.save_history(user_id, &history).await;
                    return outcome.response;
                }
            }
        }
    }

    async fn load_history(&self, user_id: &str) -> Vec<ConversationEntry> {
        let Some(resource) = self.resources.memory() else {
            return Vec::new();
        };
        let Some(memory) = resource.as_memory() else {
            return Vec::new();
        };
        match memory.load_conversation(user_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load conversation; starting fresh");
                Vec::new()
            }
        }
    }

    async fn save_history(&self, user_id: &str, history: &[ConversationEntry]) {
        let Some(resource) = self.resources.memory() else {
            return;
        };
        if let Some(memory) = resource.as_memory() {
            if let Err(e) = memory.save_conversation(user_id, history).await {
                warn!(user_id, error = %e, "Failed to save conversation");
            }
        }
    }
}

/// Text stored in the conversation for a response.
fn render_response(response: &Value) -> String {
    match response {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("content")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map_or_else(|| response.to_string(), str::to_string),
        other => other.to_string(),
    }
}
