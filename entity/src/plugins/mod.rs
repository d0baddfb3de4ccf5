//! Stage plugins.

mod builtin;
mod interfaces;

pub use builtin::{BasicLogger, ErrorFormatter, StaticFallback};
pub use interfaces::{Plugin, PluginKind};
