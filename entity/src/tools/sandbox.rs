//! Isolation limits applied to every tool invocation.

use super::Tool;
use crate::errors::{panic_message, ToolError};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// Runs tool bodies under a timeout and an output size ceiling.
///
/// Tools run in-process, so the output ceiling stands in for a memory limit.
/// A panicking tool body is caught and reported as a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxRunner {
    timeout: Duration,
    max_output_bytes: Option<usize>,
}

impl Default for SandboxRunner {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl SandboxRunner {
    /// Creates a runner with the given timeout and no output ceiling.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_output_bytes: None,
        }
    }

    /// Sets the output ceiling in serialized bytes.
    #[must_use]
    pub fn with_max_output_bytes(mut self, limit: usize) -> Self {
        self.max_output_bytes = Some(limit);
        self
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs one attempt of `tool`.
    pub async fn run(&self, tool: &dyn Tool, params: Value) -> Result<Value, ToolError> {
        let name = tool.name();
        let attempt = AssertUnwindSafe(tool.execute(params)).catch_unwind();
        let output = match tokio::time::timeout(self.timeout, attempt).await {
            Err(_) => {
                return Err(ToolError::Timeout {
                    name: name.to_string(),
                    timeout: self.timeout,
                })
            }
            Ok(Err(payload)) => {
                let message = panic_message(payload.as_ref());
                return Err(ToolError::execution_failed(
                    name,
                    1,
                    anyhow::anyhow!("tool panicked: {message}"),
                ));
            }
            Ok(Ok(Err(source))) => return Err(ToolError::execution_failed(name, 1, source)),
            Ok(Ok(Ok(output))) => output,
        };

        if let Some(limit) = self.max_output_bytes {
            let actual = serde_json::to_vec(&output).map_or(0, |bytes| bytes.len());
            if actual > limit {
                return Err(ToolError::ResourceLimit {
                    name: name.to_string(),
                    limit,
                    actual,
                });
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        async fn execute(&self, params: Value) -> anyhow::Result<Value> {
            if let Some(index) = params["explode"].as_u64() {
                let empty: Vec<u8> = Vec::new();
                return Ok(json!(empty[usize::try_from(index).unwrap_or(usize::MAX)]));
            }
            let secs = params["secs"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_secs(secs)).await;
            Ok(json!("x".repeat(64)))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        let runner = SandboxRunner::new(Duration::from_secs(1));
        let err = runner.run(&Sleepy, json!({"secs": 5})).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_output_ceiling() {
        let runner = SandboxRunner::default().with_max_output_bytes(16);
        let err = runner.run(&Sleepy, json!({"secs": 0})).await.unwrap_err();
        assert!(matches!(err, ToolError::ResourceLimit { limit: 16, actual: 66, .. }));
    }

    #[tokio::test]
    async fn test_panic_becomes_execution_failure() {
        let runner = SandboxRunner::default();
        let err = runner.run(&Sleepy, json!({"explode": 3})).await.unwrap_err();

        assert!(matches!(err, ToolError::ExecutionFailed { ref name, .. } if name == "sleepy"));
        assert!(err.to_string().contains("tool panicked: index out of bounds"));
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let runner = SandboxRunner::default();
        let output = runner.run(&Sleepy, json!({})).await.unwrap();
        assert_eq!(output.as_str().map(str::len), Some(64));
    }
}
