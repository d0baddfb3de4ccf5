//! Tool trait and tool call types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Per-tool retry settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Seconds to wait between attempts. No backoff multiplier is applied.
    pub delay_secs: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay_secs: 1.0,
        }
    }
}

impl RetryOptions {
    /// Creates retry options.
    #[must_use]
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            delay_secs: delay.as_secs_f64(),
        }
    }

    /// Disables retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            delay_secs: 0.0,
        }
    }

    /// Returns the delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_secs).unwrap_or(Duration::ZERO)
    }

    /// Returns the total number of attempts.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// A unit of work that plugins invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool name.
    fn name(&self) -> &str;

    /// Returns a human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Returns the JSON schema parameters must satisfy, if any.
    fn input_schema(&self) -> Option<&Value> {
        None
    }

    /// Returns the JSON schema results must satisfy, if any.
    fn output_schema(&self) -> Option<&Value> {
        None
    }

    /// Returns the retry settings for this tool.
    fn retry_options(&self) -> RetryOptions {
        RetryOptions::default()
    }

    /// Runs the tool with validated parameters.
    async fn execute(&self, params: Value) -> anyhow::Result<Value>;
}

/// How a tool call entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallSource {
    /// Invoked immediately through `tool_use`.
    DirectExecution,
    /// Deferred through `queue_tool_use`.
    Queued,
}

/// A pending or in-flight tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The tool name.
    pub name: String,
    /// Parameters passed to the tool.
    pub params: Value,
    /// Unique key the result is stored under.
    pub result_key: String,
    /// How the call was made.
    pub source: ToolCallSource,
}

impl ToolCall {
    /// Creates a call with a fresh result key.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Value, source: ToolCallSource) -> Self {
        let name = name.into();
        let result_key = format!("{name}_result_{}", Uuid::new_v4().simple());
        Self {
            name,
            params,
            result_key,
            source,
        }
    }

    /// Creates an immediate call.
    #[must_use]
    pub fn direct(name: impl Into<String>, params: Value) -> Self {
        Self::new(name, params, ToolCallSource::DirectExecution)
    }

    /// Creates a deferred call.
    #[must_use]
    pub fn queued(name: impl Into<String>, params: Value) -> Self {
        Self::new(name, params, ToolCallSource::Queued)
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::from(self.name.as_str()));
        map.insert("params".to_string(), self.params.clone());
        map.insert("result_key".to_string(), Value::from(self.result_key.as_str()));
        map.insert(
            "source".to_string(),
            serde_json::to_value(self.source).unwrap_or(Value::Null),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_defaults() {
        let options = RetryOptions::default();
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.attempts(), 2);
        assert_eq!(options.delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_result_keys_are_unique() {
        let a = ToolCall::queued("calc", json!({"expression": "2+2"}));
        let b = ToolCall::queued("calc", json!({"expression": "2+2"}));
        assert_ne!(a.result_key, b.result_key);
        assert!(a.result_key.starts_with("calc_result_"));
    }

    #[test]
    fn test_to_dict_source() {
        let call = ToolCall::direct("search", json!({}));
        assert_eq!(call.to_dict()["source"], "direct_execution");
    }
}
