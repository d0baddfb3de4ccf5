//! Per-run pipeline state.

use super::StageResults;
use crate::core::{ConversationEntry, FailureInfo, PipelineStage, Role};
use crate::tools::ToolCall;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Generates a run id: a UTC timestamp with microseconds plus 8 random hex digits.
#[must_use]
pub fn generate_pipeline_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S%6f"), &random[..8])
}

/// Everything one pipeline run owns.
///
/// Created at the start of a run and discarded once the response has been
/// returned. Nothing in here is shared between runs.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub(crate) pipeline_id: String,
    pub(crate) conversation: Vec<ConversationEntry>,
    pub(crate) response: Option<Value>,
    pub(crate) stage_results: StageResults,
    pub(crate) pending_tool_calls: VecDeque<ToolCall>,
    pub(crate) metadata: HashMap<String, Value>,
    pub(crate) current_stage: PipelineStage,
    pub(crate) failure_info: Option<FailureInfo>,
    pub(crate) tool_failures: Vec<FailureInfo>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new(super::results::DEFAULT_MAX_STAGE_RESULTS)
    }
}

impl PipelineState {
    /// Creates an empty state with a fresh pipeline id.
    #[must_use]
    pub fn new(max_stage_results: usize) -> Self {
        Self {
            pipeline_id: generate_pipeline_id(),
            conversation: Vec::new(),
            response: None,
            stage_results: StageResults::new(max_stage_results),
            pending_tool_calls: VecDeque::new(),
            metadata: HashMap::new(),
            current_stage: PipelineStage::Input,
            failure_info: None,
            tool_failures: Vec::new(),
        }
    }

    /// Seeds the conversation with prior history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ConversationEntry>) -> Self {
        self.conversation = history;
        self
    }

    /// Appends the incoming user message.
    #[must_use]
    pub fn with_user_message(mut self, message: impl Into<String>) -> Self {
        self.conversation.push(ConversationEntry::user(message));
        self
    }

    /// Returns the run id.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Returns the conversation in append order.
    #[must_use]
    pub fn conversation(&self) -> &[ConversationEntry] {
        &self.conversation
    }

    /// Returns the response, if set.
    #[must_use]
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    /// Returns the stage results.
    #[must_use]
    pub fn stage_results(&self) -> &StageResults {
        &self.stage_results
    }

    /// Returns the queued tool calls.
    #[must_use]
    pub fn pending_tool_calls(&self) -> &VecDeque<ToolCall> {
        &self.pending_tool_calls
    }

    /// Returns the run metadata.
    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// Returns the stage currently executing.
    #[must_use]
    pub fn current_stage(&self) -> PipelineStage {
        self.current_stage
    }

    /// Returns the plugin failure that routed this run to ERROR.
    #[must_use]
    pub fn failure_info(&self) -> Option<&FailureInfo> {
        self.failure_info.as_ref()
    }

    /// Returns failures of queued tool calls, in call order.
    #[must_use]
    pub fn tool_failures(&self) -> &[FailureInfo] {
        &self.tool_failures
    }

    /// Returns the content of the most recent user entry.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.conversation
            .iter()
            .rev()
            .find(|entry| entry.role == Role::User)
            .map(|entry| entry.content.as_str())
    }

    /// Records the run's failure. Only the first call has any effect.
    pub(crate) fn record_failure(&mut self, failure: FailureInfo) -> bool {
        if self.failure_info.is_some() {
            return false;
        }
        self.failure_info = Some(failure);
        true
    }

    /// Captures the parts of the state useful when diagnosing a failure.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("pipeline_id".to_string(), json!(self.pipeline_id));
        map.insert("stage".to_string(), json!(self.current_stage.as_str()));
        map.insert("conversation_length".to_string(), json!(self.conversation.len()));
        map.insert("last_user_message".to_string(), json!(self.last_user_message()));
        map.insert(
            "stage_result_keys".to_string(),
            json!(self.stage_results.keys().collect::<Vec<_>>()),
        );
        map.insert(
            "pending_tool_calls".to_string(),
            json!(self.pending_tool_calls.len()),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_id_format() {
        let id = generate_pipeline_id();
        let (timestamp, suffix) = id.split_once('-').unwrap();
        assert_eq!(timestamp.len(), 20);
        assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 8);
        assert_ne!(id, generate_pipeline_id());
    }

    #[test]
    fn test_last_user_message_skips_other_roles() {
        let state = PipelineState::default()
            .with_user_message("first")
            .with_history(vec![
                ConversationEntry::user("question"),
                ConversationEntry::assistant("answer"),
                ConversationEntry::system("Tool result: 4"),
            ]);

        assert_eq!(state.last_user_message(), Some("question"));
    }

    #[test]
    fn test_failure_is_write_once() {
        let mut state = PipelineState::default();
        let first = FailureInfo::new(PipelineStage::Do, "a", &anyhow::anyhow!("first"));
        let second = FailureInfo::new(PipelineStage::Review, "b", &anyhow::anyhow!("second"));

        assert!(state.record_failure(first));
        assert!(!state.record_failure(second));
        assert_eq!(state.failure_info().map(|f| f.plugin_name.as_str()), Some("a"));
    }

    #[test]
    fn test_snapshot_fields() {
        let state = PipelineState::default().with_user_message("hello");
        let snapshot = state.snapshot();
        assert_eq!(snapshot["last_user_message"], "hello");
        assert_eq!(snapshot["conversation_length"], 1);
        assert_eq!(snapshot["stage"], "INPUT");
    }
}
