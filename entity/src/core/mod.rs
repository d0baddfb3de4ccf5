//! Core domain model types for the pipeline engine.
//!
//! This module contains the fundamental types used throughout the engine:
//! - The ordered stage enum
//! - Conversation entries
//! - Failure info captured on plugin errors
//! - Standard response payloads

mod conversation;
mod failure;
pub mod response;
mod stage;

pub use conversation::{ConversationEntry, Role};
pub use failure::FailureInfo;
pub use stage::{PipelineStage, StageLike};
