//! Build pipeline orchestration
//!
//! One [`PipelineRun`] is owned by the orchestrator for the duration of a
//! build and handed to the caller afterwards: the ordered trail of stage
//! results plus a terminal outcome. Skipped optional stages are absent from
//! the trail, not recorded as no-ops.

mod error;
pub mod orchestrator;

pub use error::PipelineError;
pub use orchestrator::Orchestrator;

use crate::executor::StageResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Terminal state of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineOutcome {
    /// Every entered stage passed
    Succeeded,
    /// A stage failed; the remaining stages were skipped
    Failed,
}

/// The ordered stage results and terminal outcome of one build invocation
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageResult>,
    pub outcome: PipelineOutcome,
}

impl PipelineRun {
    pub fn succeeded(&self) -> bool {
        self.outcome == PipelineOutcome::Succeeded
    }

    /// Duration of the whole run in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}
