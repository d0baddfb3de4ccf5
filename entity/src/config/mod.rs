//! Configuration loading.
//!
//! The document is JSON. String values may reference the environment with
//! `${VAR}` or `${VAR:-default}`; placeholders are resolved before the
//! document is deserialized.

mod env;
mod system;

pub use env::{interpolate_env, interpolate_env_with};
pub use system::{section_kinds, PluginEntry, PluginSection, RuntimeConfig, SystemConfig};
