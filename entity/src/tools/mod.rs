//! Tool subsystem.
//!
//! Plugins call tools either immediately (`tool_use`) or by queueing calls
//! that run concurrently once the current stage finishes (`queue_tool_use`).

mod definitions;
mod executor;
mod registry;
mod sandbox;
pub mod schema;

pub use definitions::{RetryOptions, Tool, ToolCall, ToolCallSource};
pub use executor::{cache_key, render_result, ToolExecutor};
pub use registry::ToolRegistry;
pub use sandbox::SandboxRunner;
