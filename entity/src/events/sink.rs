//! Event types and sink implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, Level};

/// The closed set of events the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    /// A run began.
    #[serde(rename = "pipeline.started")]
    PipelineStarted,
    /// A run returned a response from the normal stage path.
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
    /// A run was routed through the ERROR stage.
    #[serde(rename = "pipeline.failed")]
    PipelineFailed,
    /// A stage began.
    #[serde(rename = "stage.started")]
    StageStarted,
    /// A stage finished.
    #[serde(rename = "stage.completed")]
    StageCompleted,
    /// Every plugin of a stage opted out.
    #[serde(rename = "stage.skipped")]
    StageSkipped,
    /// A plugin raised.
    #[serde(rename = "plugin.failed")]
    PluginFailed,
    /// A tool call was dispatched.
    #[serde(rename = "tool.invoked")]
    ToolInvoked,
    /// A tool call produced a result.
    #[serde(rename = "tool.completed")]
    ToolCompleted,
    /// A tool call failed after retries.
    #[serde(rename = "tool.failed")]
    ToolFailed,
    /// A tool result was served from cache.
    #[serde(rename = "tool.cache_hit")]
    ToolCacheHit,
}

impl EventKind {
    /// Returns the dotted event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::PipelineCompleted => "pipeline.completed",
            Self::PipelineFailed => "pipeline.failed",
            Self::StageStarted => "stage.started",
            Self::StageCompleted => "stage.completed",
            Self::StageSkipped => "stage.skipped",
            Self::PluginFailed => "plugin.failed",
            Self::ToolInvoked => "tool.invoked",
            Self::ToolCompleted => "tool.completed",
            Self::ToolFailed => "tool.failed",
            Self::ToolCacheHit => "tool.cache_hit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineEvent {
    /// What happened.
    pub kind: EventKind,
    /// The run that emitted it.
    pub pipeline_id: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Event-specific payload.
    pub data: Value,
}

impl PipelineEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: EventKind, pipeline_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            pipeline_id: pipeline_id.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Receiver for pipeline events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    async fn emit(&self, event: PipelineEvent);

    /// Emits an event without awaiting. Must never panic.
    fn try_emit(&self, event: PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: PipelineEvent) {}

    fn try_emit(&self, _event: PipelineEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at the given level (DEBUG or INFO).
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    fn log_event(&self, event: &PipelineEvent) {
        if self.level == Level::DEBUG {
            debug!(
                event = %event.kind,
                pipeline_id = %event.pipeline_id,
                data = %event.data,
                "Pipeline event"
            );
        } else {
            info!(
                event = %event.kind,
                pipeline_id = %event.pipeline_id,
                data = %event.data,
                "Pipeline event"
            );
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        self.log_event(&event);
    }

    fn try_emit(&self, event: PipelineEvent) {
        self.log_event(&event);
    }
}

/// Keeps every event in memory, for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the kinds of all collected events, in emission order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.read().iter().map(|e| e.kind).collect()
    }

    /// Returns the events of one kind.
    #[must_use]
    pub fn of_kind(&self, kind: EventKind) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }

    fn try_emit(&self, event: PipelineEvent) {
        self.events.write().push(event);
    }
}
