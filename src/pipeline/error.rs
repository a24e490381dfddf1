//! Pipeline error taxonomy
//!
//! Every variant is fatal to the run: the orchestrator logs it with stage
//! context and flips the run to Failed. There are no retries anywhere,
//! because build-tool failures are deterministic given the same workspace
//! and configuration.

use crate::config::ConfigError;
use crate::launcher::LaunchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration detected before any process launch
    #[error(transparent)]
    Preflight(#[from] ConfigError),

    /// A stage's process exited with a non-zero code
    #[error("Stage {stage} failed with exit code {exit_code}")]
    ToolInvocation { stage: String, exit_code: i32 },

    /// A stage's process exited cleanly but its output contains failure
    /// markers
    #[error("Stage {stage} exited cleanly but its output reports a failure")]
    ClassifiedFailure { stage: String },

    /// Archive creation or file manipulation failed during packaging
    #[error("Packaging failed: {source}")]
    Packaging {
        #[source]
        source: anyhow::Error,
    },

    /// A stage's process could not be launched or streamed
    #[error("Stage {stage} could not run its process: {source}")]
    Launch {
        stage: String,
        #[source]
        source: LaunchError,
    },
}

impl PipelineError {
    pub fn launch(stage: impl Into<String>, source: LaunchError) -> Self {
        Self::Launch {
            stage: stage.into(),
            source,
        }
    }

    /// Name of the stage the error belongs to, for the result trail
    pub fn stage(&self) -> &str {
        match self {
            Self::Preflight(_) => "preflight",
            Self::ToolInvocation { stage, .. }
            | Self::ClassifiedFailure { stage }
            | Self::Launch { stage, .. } => stage,
            Self::Packaging { .. } => "package",
        }
    }
}
