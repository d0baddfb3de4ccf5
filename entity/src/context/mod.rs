//! Per-run state and the context plugins operate on.

mod plugin_context;
mod results;
mod state;

pub use plugin_context::PluginContext;
pub use results::{StageResults, DEFAULT_MAX_STAGE_RESULTS};
pub use state::{generate_pipeline_id, PipelineState};
