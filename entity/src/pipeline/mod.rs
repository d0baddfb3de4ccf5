//! Startup and execution.
//!
//! This module provides:
//! - Dependency validation over configured names
//! - The four-phase system initializer
//! - The stage loop and its ERROR-stage handling
//! - The conversation manager driving follow-up passes

mod dependency_graph;
mod executor;
mod initializer;
#[cfg(test)]
mod integration_tests;
mod manager;

pub use dependency_graph::{DependencyError, DependencyGraph, OPTIONAL_MARKER};
pub use executor::{
    execute_pipeline, ExecutionReport, PipelineExecutor, PipelineOutcome, StageSkipTracker,
    EXECUTION_REPORT_KEY,
};
pub use initializer::{Registries, SystemInitializer, VALIDATION_FAILED_MESSAGE};
pub use manager::ConversationManager;
