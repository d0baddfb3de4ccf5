//! Fakes for exercising pipelines in tests.
//!
//! - Plugins that record, fail, respond, queue tools, or echo
//! - Tools that count, calculate, or fail transiently
//! - A resource that never passes runtime validation
//! - Classes wrapping the fakes for initializer tests

mod plugins;
mod resources;
mod tools;

pub use plugins::{
    counting_plugin_class, echo_prompt_class, EchoPrompt, ExecutionLog, FailingPlugin,
    RecordingPlugin, RespondingPlugin, ToolQueuePlugin,
};
pub use resources::{failing_resource_class, FailingResource};
pub use tools::{CalculatorTool, CountingTool, FlakyTool};
