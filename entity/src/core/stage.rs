//! Pipeline stage enum.

use crate::errors::UnknownStageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named phase in the fixed pipeline ordering.
///
/// Variants are declared in execution order, so the derived `Ord` is the
/// stage order. `Error` sits outside the normal pass and is only entered
/// after a plugin failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineStage {
    /// Receive raw input from an adapter.
    Input,
    /// Parse and normalize the input.
    Parse,
    /// Reason about the request.
    Think,
    /// Perform actions and tool calls.
    Do,
    /// Review the outcome.
    Review,
    /// Deliver the response.
    Output,
    /// Handle a failure from any earlier stage.
    Error,
}

impl PipelineStage {
    /// Stages of a normal pass, in order. `Error` is excluded.
    pub const ORDERED: [Self; 6] = [
        Self::Input,
        Self::Parse,
        Self::Think,
        Self::Do,
        Self::Review,
        Self::Output,
    ];

    /// Every stage, including `Error`.
    pub const ALL: [Self; 7] = [
        Self::Input,
        Self::Parse,
        Self::Think,
        Self::Do,
        Self::Review,
        Self::Output,
        Self::Error,
    ];

    /// Parses a stage name, case-insensitively.
    ///
    /// `DELIVER` is accepted as an alias of `OUTPUT`.
    pub fn from_string(name: &str) -> Result<Self, UnknownStageError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "INPUT" => Ok(Self::Input),
            "PARSE" => Ok(Self::Parse),
            "THINK" => Ok(Self::Think),
            "DO" => Ok(Self::Do),
            "REVIEW" => Ok(Self::Review),
            "OUTPUT" | "DELIVER" => Ok(Self::Output),
            "ERROR" => Ok(Self::Error),
            _ => Err(UnknownStageError::new(name)),
        }
    }

    /// Converts anything stage-like into a stage. Idempotent for stages.
    pub fn ensure(value: impl StageLike) -> Result<Self, UnknownStageError> {
        value.into_stage()
    }

    /// Returns the position in the ordering.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Returns the upper-case stage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "INPUT",
            Self::Parse => "PARSE",
            Self::Think => "THINK",
            Self::Do => "DO",
            Self::Review => "REVIEW",
            Self::Output => "OUTPUT",
            Self::Error => "ERROR",
        }
    }
}

/// Values that can name a pipeline stage.
pub trait StageLike {
    /// Resolves the value to a stage.
    fn into_stage(self) -> Result<PipelineStage, UnknownStageError>;
}

impl StageLike for PipelineStage {
    fn into_stage(self) -> Result<PipelineStage, UnknownStageError> {
        Ok(self)
    }
}

impl StageLike for &str {
    fn into_stage(self) -> Result<PipelineStage, UnknownStageError> {
        PipelineStage::from_string(self)
    }
}

impl StageLike for String {
    fn into_stage(self) -> Result<PipelineStage, UnknownStageError> {
        PipelineStage::from_string(&self)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = UnknownStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl TryFrom<&str> for PipelineStage {
    type Error = UnknownStageError;

    fn try_from(value: &str) -> Result<Self, UnknownStageError> {
        Self::from_string(value)
    }
}

impl TryFrom<String> for PipelineStage {
    type Error = UnknownStageError;

    fn try_from(value: String) -> Result<Self, UnknownStageError> {
        Self::from_string(&value)
    }
}
