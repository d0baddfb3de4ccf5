//! Pipeline lifecycle events.
//!
//! The executor reports stage, plugin, and tool transitions to an injected
//! [`EventSink`]. There is no process-wide sink; callers that do not care pass
//! a [`NoOpEventSink`].

mod sink;

pub use sink::{
    CollectingEventSink, EventKind, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent,
};
