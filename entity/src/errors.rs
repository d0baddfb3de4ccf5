//! Error types for the entity pipeline engine.
//!
//! Configuration errors are fatal to startup, plugin errors are routed to the
//! ERROR stage, tool errors are returned as values, and breaker errors fail
//! fast without touching the wrapped call.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum EntityError {
    /// An unrecognized stage name.
    #[error("{0}")]
    UnknownStage(#[from] UnknownStageError),

    /// A dependency cycle between plugins.
    #[error("{0}")]
    CircularDependency(#[from] CircularDependencyError),

    /// A required dependency that was never registered.
    #[error("{0}")]
    MissingDependency(#[from] MissingDependencyError),

    /// Startup failed.
    #[error("{0}")]
    Initialization(#[from] InitializationError),

    /// A circuit breaker rejected the call.
    #[error("{0}")]
    CircuitBreakerTripped(#[from] CircuitBreakerTrippedError),

    /// A tool call failed.
    #[error("{0}")]
    Tool(#[from] ToolError),

    /// A plugin raised during execution.
    #[error("{0}")]
    Plugin(#[from] PluginError),

    /// A plugin context contract was violated.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONFIG-001-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("summary".to_string(), serde_json::json!(self.summary));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        if !self.context.is_empty() {
            map.insert("context".to_string(), serde_json::json!(self.context));
        }

        map
    }
}

/// Error raised when a stage name cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown stage '{value}'; expected one of INPUT, PARSE, THINK, DO, REVIEW, OUTPUT, ERROR")]
pub struct UnknownStageError {
    /// The rejected input.
    pub value: String,
}

impl UnknownStageError {
    /// Creates a new unknown stage error.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Error raised when plugin dependencies form a cycle.
#[derive(Debug, Clone, Error)]
#[error("Circular dependency detected: {}", cycle.join(" -> "))]
pub struct CircularDependencyError {
    /// The path forming the cycle; first and last entries are the same node.
    pub cycle: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CircularDependencyError {
    /// Creates a new circular dependency error.
    #[must_use]
    pub fn new(cycle: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "CONFIG-001-CYCLE",
            format!("Plugin dependencies form a cycle: {}", cycle.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle,
            error_info: info,
        }
    }

    /// Returns the distinct nodes participating in the cycle.
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = Vec::new();
        for node in &self.cycle {
            if !nodes.contains(node) {
                nodes.push(node.clone());
            }
        }
        nodes
    }
}

/// Error raised when a required dependency is not registered.
#[derive(Debug, Clone, Error)]
#[error("Plugin '{plugin}' requires '{missing_dep}' which is not registered (available: {})", available.join(", "))]
pub struct MissingDependencyError {
    /// The plugin declaring the dependency.
    pub plugin: String,
    /// The dependency that could not be resolved.
    pub missing_dep: String,
    /// Every registered name at the time of the check.
    pub available: Vec<String>,
}

impl MissingDependencyError {
    /// Creates a new missing dependency error.
    #[must_use]
    pub fn new(
        plugin: impl Into<String>,
        missing_dep: impl Into<String>,
        mut available: Vec<String>,
    ) -> Self {
        available.sort();
        Self {
            plugin: plugin.into(),
            missing_dep: missing_dep.into(),
            available,
        }
    }

    /// Returns contract error info describing this failure.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        ContractErrorInfo::new(
            "CONFIG-002-MISSING_DEP",
            format!("Dependency '{}' not found", self.missing_dep),
        )
        .with_fix_hint("Register the dependency or mark it optional with a trailing '?'.")
        .with_context_entry("plugin", &self.plugin)
    }
}

/// The startup phase in which an initialization error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPhase {
    /// Phase 1: class registration.
    Registration,
    /// Phase 2: dependency and config validation.
    Validation,
    /// Phase 3: resource construction and runtime validation.
    Resources,
    /// Phase 4: plugin and tool instantiation.
    Plugins,
}

impl fmt::Display for InitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Validation => write!(f, "validation"),
            Self::Resources => write!(f, "resources"),
            Self::Plugins => write!(f, "plugins"),
        }
    }
}

/// Error raised when system startup fails.
#[derive(Debug, Clone, Error)]
#[error("Initialization failed during {phase} phase{}: {message}", plugin.as_ref().map(|p| format!(" for '{p}'")).unwrap_or_default())]
pub struct InitializationError {
    /// The phase that failed.
    pub phase: InitPhase,
    /// The plugin or resource involved, if any.
    pub plugin: Option<String>,
    /// The error message.
    pub message: String,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl InitializationError {
    /// Creates a new initialization error.
    #[must_use]
    pub fn new(phase: InitPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            plugin: None,
            message: message.into(),
            error_info: None,
        }
    }

    /// Sets the plugin involved.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }
}

impl From<CircularDependencyError> for InitializationError {
    fn from(err: CircularDependencyError) -> Self {
        Self {
            phase: InitPhase::Validation,
            plugin: err.cycle.first().cloned(),
            message: err.to_string(),
            error_info: Some(err.error_info),
        }
    }
}

impl From<MissingDependencyError> for InitializationError {
    fn from(err: MissingDependencyError) -> Self {
        Self {
            phase: InitPhase::Validation,
            plugin: Some(err.plugin.clone()),
            message: err.to_string(),
            error_info: Some(err.error_info()),
        }
    }
}

/// Error returned when a circuit breaker is open.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Circuit breaker '{category}' is open after {failure_count} failures; retry in {retry_after:?}")]
pub struct CircuitBreakerTrippedError {
    /// The breaker category.
    pub category: String,
    /// Failures counted when the call was rejected.
    pub failure_count: u32,
    /// Time remaining until the breaker admits calls again.
    pub retry_after: Duration,
}

/// Errors related to tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool was not found in the registry.
    #[error("Tool not found: {name}")]
    NotFound {
        /// The tool name.
        name: String,
    },

    /// Parameters did not match the input schema.
    #[error("Invalid input for tool {name}: {reason}")]
    InvalidInput {
        /// The tool name.
        name: String,
        /// The validation failure.
        reason: String,
    },

    /// The result did not match the output schema.
    #[error("Invalid output from tool {name}: {reason}")]
    InvalidOutput {
        /// The tool name.
        name: String,
        /// The validation failure.
        reason: String,
    },

    /// The sandboxed call exceeded its timeout.
    #[error("Tool {name} timed out after {timeout:?}")]
    Timeout {
        /// The tool name.
        name: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// The result exceeded the sandbox output ceiling.
    #[error("Tool {name} produced {actual} bytes, exceeding the {limit} byte limit")]
    ResourceLimit {
        /// The tool name.
        name: String,
        /// The configured ceiling in bytes.
        limit: usize,
        /// The observed size in bytes.
        actual: usize,
    },

    /// Tool execution failed after all retries.
    #[error("Tool execution failed: {name} - {source}")]
    ExecutionFailed {
        /// The tool name.
        name: String,
        /// Attempts made before giving up.
        attempts: u32,
        /// The originating error.
        #[source]
        source: anyhow::Error,
    },
}

impl ToolError {
    /// Creates a tool not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid output error.
    #[must_use]
    pub fn invalid_output(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOutput {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an execution failed error.
    #[must_use]
    pub fn execution_failed(name: impl Into<String>, attempts: u32, source: anyhow::Error) -> Self {
        Self::ExecutionFailed {
            name: name.into(),
            attempts,
            source,
        }
    }

    /// Returns the tool name.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        match self {
            Self::NotFound { name }
            | Self::InvalidInput { name, .. }
            | Self::InvalidOutput { name, .. }
            | Self::Timeout { name, .. }
            | Self::ResourceLimit { name, .. }
            | Self::ExecutionFailed { name, .. } => name,
        }
    }

    /// Returns a stable type name for payloads and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "ToolNotFound",
            Self::InvalidInput { .. } => "ToolInputValidationError",
            Self::InvalidOutput { .. } => "ToolOutputValidationError",
            Self::Timeout { .. } => "ToolTimeout",
            Self::ResourceLimit { .. } => "ToolResourceLimit",
            Self::ExecutionFailed { .. } => "ToolExecutionError",
        }
    }

    /// Returns the message used for inline `"Error: ..."` results.
    #[must_use]
    pub fn inline_message(&self) -> String {
        match self {
            Self::ExecutionFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("name".to_string(), serde_json::json!(self.tool_name()));
        if let Self::ExecutionFailed { attempts, .. } = self {
            map.insert("attempts".to_string(), serde_json::json!(attempts));
        }
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Extracts the message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Error raised by a plugin during stage execution.
#[derive(Debug, Error)]
#[error("Plugin '{plugin}' failed in stage {stage}: {source}")]
pub struct PluginError {
    /// The plugin name.
    pub plugin: String,
    /// The stage being executed.
    pub stage: String,
    /// The originating error.
    #[source]
    pub source: anyhow::Error,
}

/// Violations of the plugin context contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// No memory resource is registered.
    #[error("No memory resource is bound to this pipeline")]
    NoMemory,

    /// The response slot was already written.
    #[error("Response has already been set for this pipeline run")]
    ResponseAlreadySet,

    /// `say` was called outside the OUTPUT stage.
    #[error("say() is only allowed during the OUTPUT stage (current stage: {stage})")]
    SayOutsideOutput {
        /// The stage active at the time of the call.
        stage: String,
    },

    /// The memory resource reported an error.
    #[error("Memory operation failed: {0}")]
    Memory(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON or does not match the schema.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// An environment placeholder had no value and no default.
    #[error("Environment variable '{0}' is not set and has no default")]
    MissingEnv(String),
}
