//! Failure context captured when a plugin raises.

use super::PipelineStage;
use crate::errors::{ContextError, ToolError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Snapshot of a failure inside a pipeline run.
///
/// The executor records exactly one of these per run, the first time a
/// plugin fails, and then transitions to the ERROR stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// The stage that was executing.
    pub stage: PipelineStage,
    /// The plugin (or tool) that failed.
    pub plugin_name: String,
    /// A stable type name for the error.
    pub error_type: String,
    /// The top-level error message.
    pub error_message: String,
    /// The full error chain, outermost first.
    pub original_exception: String,
    /// When the failure was captured.
    pub timestamp: DateTime<Utc>,
    /// Selected run state at the time of failure.
    #[serde(default)]
    pub context_snapshot: HashMap<String, serde_json::Value>,
}

impl FailureInfo {
    /// Creates failure info from an arbitrary error.
    #[must_use]
    pub fn new(stage: PipelineStage, plugin_name: impl Into<String>, error: &anyhow::Error) -> Self {
        Self {
            stage,
            plugin_name: plugin_name.into(),
            error_type: error_type_name(error).to_string(),
            error_message: error.to_string(),
            original_exception: format!("{error:#}"),
            timestamp: Utc::now(),
            context_snapshot: HashMap::new(),
        }
    }

    /// Creates failure info from a tool error.
    #[must_use]
    pub fn from_tool_error(stage: PipelineStage, error: &ToolError) -> Self {
        let chain = match error {
            ToolError::ExecutionFailed { source, .. } => format!("{error}: {source:#}"),
            other => other.to_string(),
        };
        Self {
            stage,
            plugin_name: error.tool_name().to_string(),
            error_type: error.kind().to_string(),
            error_message: error.inline_message(),
            original_exception: chain,
            timestamp: Utc::now(),
            context_snapshot: HashMap::new(),
        }
    }

    /// Attaches a context snapshot.
    #[must_use]
    pub fn with_context_snapshot(mut self, snapshot: HashMap<String, serde_json::Value>) -> Self {
        self.context_snapshot = snapshot;
        self
    }
}

/// Best-effort type name for errors raised by plugins.
fn error_type_name(error: &anyhow::Error) -> &'static str {
    if let Some(tool) = error.downcast_ref::<ToolError>() {
        return tool.kind();
    }
    if error.downcast_ref::<ContextError>().is_some() {
        return "ContextError";
    }
    if error.downcast_ref::<serde_json::Error>().is_some() {
        return "SerializationError";
    }
    if error.downcast_ref::<std::io::Error>().is_some() {
        return "IoError";
    }
    "PluginExecutionError"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_from_plain_error() {
        let err = anyhow::anyhow!("boom");
        let info = FailureInfo::new(PipelineStage::Do, "explode", &err);

        assert_eq!(info.stage, PipelineStage::Do);
        assert_eq!(info.plugin_name, "explode");
        assert_eq!(info.error_type, "PluginExecutionError");
        assert_eq!(info.error_message, "boom");
    }

    #[test]
    fn test_failure_error_chain() {
        let err = anyhow::anyhow!("socket closed").context("fetch failed");
        let info = FailureInfo::new(PipelineStage::Think, "fetcher", &err);

        assert_eq!(info.error_message, "fetch failed");
        assert_eq!(info.original_exception, "fetch failed: socket closed");
    }

    #[test]
    fn test_failure_from_tool_error() {
        let err = ToolError::execution_failed("calc", 2, anyhow::anyhow!("bad expression"));
        let info = FailureInfo::from_tool_error(PipelineStage::Do, &err);

        assert_eq!(info.plugin_name, "calc");
        assert_eq!(info.error_type, "ToolExecutionError");
        assert_eq!(info.error_message, "bad expression");
    }

    #[test]
    fn test_failure_downcasts_context_error() {
        let err = anyhow::Error::new(ContextError::ResponseAlreadySet);
        let info = FailureInfo::new(PipelineStage::Output, "writer", &err);
        assert_eq!(info.error_type, "ContextError");
    }
}
