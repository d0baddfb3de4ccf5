//! Name-keyed registries.
//!
//! - [`ResourceRegistry`]: shared resources built at startup
//! - [`PluginRegistry`]: stage-bound plugins in execution order
//! - [`PluginFactoryRegistry`]: string ids → constructors
//! - [`ClassRegistry`]: configured classes awaiting validation

mod classes;
pub mod factory;
mod plugins;
mod resources;

pub use classes::{ClassEntry, ClassRegistry};
pub use factory::{Constructor, PluginClass, PluginFactoryRegistry, PluginSetup};
pub use plugins::{PluginRegistry, RegisteredPlugin};
pub use resources::{ResourceRegistry, CACHE, LOGGING, MEMORY, METRICS_COLLECTOR};
