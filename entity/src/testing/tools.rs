//! Fake tools.

use crate::tools::{RetryOptions, Tool};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

/// Returns its parameters and counts invocations.
#[derive(Debug)]
pub struct CountingTool {
    name: String,
    calls: AtomicU32,
}

impl CountingTool {
    /// Creates a counting tool.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicU32::new(0),
        }
    }

    /// Returns how many times the tool ran.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_options(&self) -> RetryOptions {
        RetryOptions::none()
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(json!({ "call": n, "params": params }))
    }
}

/// Evaluates `a+b`, `a-b`, `a*b` or `a/b` over integers.
///
/// An optional `delay_ms` parameter sleeps before answering.
#[derive(Debug, Default)]
pub struct CalculatorTool;

impl CalculatorTool {
    /// Creates the calculator. Its name is `calc`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn calculator_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        json!({
            "type": "object",
            "required": ["expression"],
            "properties": {
                "expression": {"type": "string"},
                "delay_ms": {"type": "integer"}
            }
        })
    })
}

fn evaluate(expression: &str) -> anyhow::Result<i64> {
    let expression: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
    let split = expression
        .char_indices()
        .skip(1)
        .find(|(_, c)| matches!(c, '+' | '-' | '*' | '/'));
    let Some((at, op)) = split else {
        return Ok(expression.parse()?);
    };
    let lhs: i64 = expression[..at].parse()?;
    let rhs: i64 = expression[at + 1..].parse()?;
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        _ if rhs == 0 => anyhow::bail!("division by zero"),
        _ => Ok(lhs / rhs),
    }
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calc"
    }

    fn description(&self) -> &str {
        "Evaluates a single integer arithmetic operation"
    }

    fn input_schema(&self) -> Option<&Value> {
        Some(calculator_schema())
    }

    fn retry_options(&self) -> RetryOptions {
        RetryOptions::none()
    }

    async fn execute(&self, params: Value) -> anyhow::Result<Value> {
        if let Some(delay) = params.get("delay_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let expression = params
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(json!(evaluate(expression)?))
    }
}

/// Fails a fixed number of times, then returns `"ok"`.
#[derive(Debug)]
pub struct FlakyTool {
    name: String,
    failures: u32,
    retry_delay: Duration,
    calls: AtomicU32,
}

impl FlakyTool {
    /// Creates a tool that fails `failures` times before succeeding.
    /// It retries once with `retry_delay` between attempts.
    #[must_use]
    pub fn new(name: impl Into<String>, failures: u32, retry_delay: Duration) -> Self {
        Self {
            name: name.into(),
            failures,
            retry_delay,
            calls: AtomicU32::new(0),
        }
    }

    /// Returns how many times the tool ran.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_options(&self) -> RetryOptions {
        RetryOptions::new(1, self.retry_delay)
    }

    async fn execute(&self, _params: Value) -> anyhow::Result<Value> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.failures {
            anyhow::bail!("transient failure {n}");
        }
        Ok(json!("ok"))
    }
}
