//! # Entity
//!
//! A staged plugin pipeline engine for LLM agents.
//!
//! Every incoming message runs through a fixed sequence of stages:
//!
//! - **Stages**: INPUT, PARSE, THINK, DO, REVIEW and OUTPUT, with ERROR
//!   reserved for failure handling
//! - **Plugins**: prompts and adapters registered per stage, run in
//!   registration order
//! - **Resources**: memory, LLM, storage and cache, built once at startup
//!   and shared by every run
//! - **Tools**: called immediately or queued to run concurrently after the
//!   current stage
//! - **Startup**: a four-phase initializer that validates classes,
//!   dependencies and resources before any plugin is built
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entity::prelude::*;
//!
//! let config = SystemConfig::from_path("entity.json")?;
//! let registries = SystemInitializer::with_defaults(config).initialize().await?;
//!
//! let response = execute_pipeline("hello", &registries).await;
//! registries.shutdown().await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod reliability;
pub mod resources;
pub mod testing;
pub mod tools;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{RuntimeConfig, SystemConfig};
    pub use crate::context::{PipelineState, PluginContext};
    pub use crate::core::{response, ConversationEntry, FailureInfo, PipelineStage, Role};
    pub use crate::errors::{
        ConfigError, ContextError, EntityError, InitializationError, ToolError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogConfig};
    pub use crate::pipeline::{
        execute_pipeline, ConversationManager, PipelineExecutor, Registries, SystemInitializer,
    };
    pub use crate::plugins::{Plugin, PluginKind};
    pub use crate::registry::{PluginClass, PluginFactoryRegistry, PluginSetup};
    pub use crate::reliability::{BreakerConfig, CircuitBreaker, RetryPolicy};
    pub use crate::resources::{Cache, Llm, Memory, Resource, ResourceCategory, Storage};
    pub use crate::tools::{RetryOptions, Tool, ToolCall, ToolExecutor};
}
