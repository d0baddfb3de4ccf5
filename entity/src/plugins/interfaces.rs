//! The plugin trait and the closed set of plugin kinds.

use crate::context::PluginContext;
use crate::core::PipelineStage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a configured component is.
///
/// Resources and tools are built into their own registries; the other kinds
/// are stage plugins run by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// A shared resource.
    Resource,
    /// A callable tool.
    Tool,
    /// Reasoning or generation logic.
    Prompt,
    /// Moves data in or out of the pipeline.
    Adapter,
    /// Handles failures in the ERROR stage.
    Failure,
}

impl PluginKind {
    /// Returns the stages a plugin of this kind runs in when nothing else says.
    ///
    /// Adapters have no default, so every adapter must name its stages.
    #[must_use]
    pub fn default_stages(self) -> &'static [PipelineStage] {
        match self {
            Self::Prompt => &[PipelineStage::Think],
            Self::Failure => &[PipelineStage::Error],
            Self::Adapter | Self::Resource | Self::Tool => &[],
        }
    }

    /// Returns true for kinds the executor runs.
    #[must_use]
    pub fn is_stage_plugin(self) -> bool {
        matches!(self, Self::Prompt | Self::Adapter | Self::Failure)
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resource => "resource",
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Adapter => "adapter",
            Self::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// A unit of logic bound to one or more stages.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Returns the plugin name.
    fn name(&self) -> &str;

    /// Returns the stages the plugin was registered for.
    fn stages(&self) -> &[PipelineStage];

    /// Returns the names of plugins or resources this plugin needs.
    fn dependencies(&self) -> &[String] {
        &[]
    }

    /// Decides whether to run for this context. Defaults to always.
    fn should_execute(&self, _ctx: &PluginContext) -> bool {
        true
    }

    /// Runs the plugin.
    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()>;

    /// Called once after registration.
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once during shutdown.
    async fn shutdown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
