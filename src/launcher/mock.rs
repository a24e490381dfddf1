//! Scripted launcher for tests
//!
//! Plays back a queue of canned outcomes instead of spawning processes, and
//! records every [`CommandSpec`] it receives so tests can assert on the
//! exact sequence of invocations (or the absence of any).

use super::{CommandSpec, LaunchError, LineSink, ProcessLauncher};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted process outcome: output lines followed by an exit code
#[derive(Debug, Clone)]
pub struct ScriptedLaunch {
    pub exit_code: i32,
    pub lines: Vec<String>,
}

impl ScriptedLaunch {
    /// Clean exit with no output
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            lines: Vec::new(),
        }
    }

    /// Clean exit emitting the given output lines
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exit_code: 0,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Non-zero exit with no output
    pub fn failure(exit_code: i32) -> Self {
        Self {
            exit_code,
            lines: Vec::new(),
        }
    }

    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }
}

/// Process launcher that replays scripted outcomes
///
/// Outcomes are consumed in FIFO order; once the queue is empty every
/// further launch succeeds silently with exit code 0.
#[derive(Debug, Default)]
pub struct MockLauncher {
    script: Mutex<VecDeque<ScriptedLaunch>>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: ScriptedLaunch) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn push_all(&self, outcomes: impl IntoIterator<Item = ScriptedLaunch>) {
        let mut script = self.script.lock().unwrap();
        for outcome in outcomes {
            script.push_back(outcome);
        }
    }

    /// Every spec launched so far, in order
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessLauncher for MockLauncher {
    async fn launch(
        &self,
        spec: &CommandSpec,
        sink: &mut dyn LineSink,
    ) -> Result<i32, LaunchError> {
        self.invocations.lock().unwrap().push(spec.clone());

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ScriptedLaunch::success);

        for line in &outcome.lines {
            sink.feed_line(line);
        }
        Ok(outcome.exit_code)
    }
}
