//! Built-in ERROR-stage plugins.

use super::Plugin;
use crate::context::PluginContext;
use crate::core::{response, PipelineStage};
use async_trait::async_trait;
use tracing::error;

const ERROR_STAGE: &[PipelineStage] = &[PipelineStage::Error];

/// Logs the captured failure.
#[derive(Debug, Clone)]
pub struct BasicLogger {
    name: String,
}

impl BasicLogger {
    /// Creates the logger plugin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Plugin for BasicLogger {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        ERROR_STAGE
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        if let Some(failure) = ctx.failure_info() {
            error!(
                pipeline_id = %ctx.pipeline_id(),
                stage = %failure.stage,
                plugin = %failure.plugin_name,
                error_type = %failure.error_type,
                error = %failure.original_exception,
                "Pipeline failure"
            );
        }
        Ok(())
    }
}

/// Responds with the static fallback payload when nothing else has.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    name: String,
    message: String,
}

impl StaticFallback {
    /// Default user-facing message.
    pub const DEFAULT_MESSAGE: &'static str =
        "Something went wrong while processing your request. Please try again.";

    /// Creates the fallback plugin with the default message.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: Self::DEFAULT_MESSAGE.to_string(),
        }
    }

    /// Sets the user-facing message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

#[async_trait]
impl Plugin for StaticFallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        ERROR_STAGE
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        if ctx.has_response() {
            return Ok(());
        }
        let payload = response::static_fallback(ctx.pipeline_id(), &self.message);
        ctx.say(payload)?;
        Ok(())
    }
}

/// Responds with a payload describing the failed plugin when nothing else has.
#[derive(Debug, Clone)]
pub struct ErrorFormatter {
    name: String,
}

impl ErrorFormatter {
    /// Creates the formatter plugin.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Plugin for ErrorFormatter {
    fn name(&self) -> &str {
        &self.name
    }

    fn stages(&self) -> &[PipelineStage] {
        ERROR_STAGE
    }

    async fn execute(&self, ctx: &mut PluginContext) -> anyhow::Result<()> {
        if ctx.has_response() {
            return Ok(());
        }
        let Some(failure) = ctx.failure_info() else {
            return Ok(());
        };
        let payload = response::plugin_error(ctx.pipeline_id(), failure);
        ctx.say(payload)?;
        Ok(())
    }
}
