//! Stage execution
//!
//! Runs one external command through the injected [`ProcessLauncher`] and
//! normalizes the outcome into a [`StageResult`]. The effective outcome of
//! a stage is Fail if the exit code is non-zero OR the classifier flagged
//! the output; a clean exit code never overrides a Fail verdict, because
//! xcodebuild reports a clean exit on some partial failures.

use crate::classify::{OutputClassifier, Verdict};
use crate::launcher::{CommandSpec, LaunchError, LineSink, ProcessLauncher};
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of one executed stage
#[derive(Debug, Clone, Serialize)]
pub struct StageResult {
    /// Stage name
    pub name: String,

    /// Process exit code (0 = success)
    pub exit_code: i32,

    /// Verdict from scanning the stage's output
    pub verdict: Verdict,

    /// Captured error/warning lines, or other stage diagnostics
    pub diagnostics: Vec<String>,
}

impl StageResult {
    /// Whether this stage passed: clean exit code and no classified failure
    pub fn passed(&self) -> bool {
        self.exit_code == 0 && self.verdict == Verdict::Pass
    }
}

/// Runs stages against a process launcher
pub struct StageExecutor<'a> {
    launcher: &'a dyn ProcessLauncher,
}

impl<'a> StageExecutor<'a> {
    pub fn new(launcher: &'a dyn ProcessLauncher) -> Self {
        Self { launcher }
    }

    /// Runs a command with failure-marker classification of its output
    ///
    /// Every output line is echoed to the operator log and fed to the
    /// classifier; the stream is always fully drained before the exit code
    /// is combined with the verdict.
    pub async fn run_classified(
        &self,
        name: &str,
        spec: &CommandSpec,
    ) -> Result<StageResult, LaunchError> {
        let mut sink = ClassifyingSink::new();
        let exit_code = self.launcher.launch(spec, &mut sink).await?;
        let classifier = sink.classifier;
        Ok(StageResult {
            name: name.to_string(),
            exit_code,
            verdict: classifier.verdict(),
            diagnostics: classifier.into_summary(),
        })
    }

    /// Runs a command whose output is logged but not classified
    pub async fn run_logged(
        &self,
        name: &str,
        spec: &CommandSpec,
    ) -> Result<StageResult, LaunchError> {
        let mut sink = EchoSink;
        let exit_code = self.launcher.launch(spec, &mut sink).await?;
        Ok(StageResult {
            name: name.to_string(),
            exit_code,
            verdict: Verdict::Pass,
            diagnostics: Vec::new(),
        })
    }

    /// Runs a command and collects its output lines for the caller to parse
    pub async fn run_captured(
        &self,
        name: &str,
        spec: &CommandSpec,
    ) -> Result<(StageResult, Vec<String>), LaunchError> {
        let mut sink = CaptureSink::default();
        let exit_code = self.launcher.launch(spec, &mut sink).await?;
        let result = StageResult {
            name: name.to_string(),
            exit_code,
            verdict: Verdict::Pass,
            diagnostics: Vec::new(),
        };
        Ok((result, sink.lines))
    }
}

struct ClassifyingSink {
    classifier: OutputClassifier,
}

impl ClassifyingSink {
    fn new() -> Self {
        Self {
            classifier: OutputClassifier::new(),
        }
    }
}

impl LineSink for ClassifyingSink {
    fn feed_line(&mut self, line: &str) {
        info!(target: "xcdrive::tool", "{}", line);
        self.classifier.feed(line);
    }
}

struct EchoSink;

impl LineSink for EchoSink {
    fn feed_line(&mut self, line: &str) {
        info!(target: "xcdrive::tool", "{}", line);
    }
}

#[derive(Default)]
struct CaptureSink {
    lines: Vec<String>,
}

impl LineSink for CaptureSink {
    fn feed_line(&mut self, line: &str) {
        debug!(target: "xcdrive::tool", "{}", line);
        self.lines.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{MockLauncher, ScriptedLaunch};

    fn spec() -> CommandSpec {
        CommandSpec::new("/usr/bin/xcodebuild", "/ws")
    }

    #[tokio::test]
    async fn test_clean_exit_and_clean_output_passes() {
        let launcher = MockLauncher::new();
        launcher.push(ScriptedLaunch::with_lines(["** BUILD SUCCEEDED **"]));

        let executor = StageExecutor::new(&launcher);
        let result = executor.run_classified("build", &spec()).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.passed());
    }

    #[tokio::test]
    async fn test_classifier_overrides_clean_exit() {
        let launcher = MockLauncher::new();
        launcher.push(ScriptedLaunch::with_lines([
            "main.m:4:1: error: expected ';'",
            "** BUILD SUCCEEDED **",
        ]));

        let executor = StageExecutor::new(&launcher);
        let result = executor.run_classified("build", &spec()).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.verdict, Verdict::Fail);
        assert!(!result.passed());
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails_even_with_clean_output() {
        let launcher = MockLauncher::new();
        launcher.push(ScriptedLaunch::failure(65));

        let executor = StageExecutor::new(&launcher);
        let result = executor.run_classified("build", &spec()).await.unwrap();

        assert_eq!(result.exit_code, 65);
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(!result.passed());
    }

    #[tokio::test]
    async fn test_run_captured_collects_lines() {
        let launcher = MockLauncher::new();
        launcher.push(ScriptedLaunch::with_lines(["2.5"]));

        let executor = StageExecutor::new(&launcher);
        let (result, lines) = executor.run_captured("version-query", &spec()).await.unwrap();

        assert!(result.passed());
        assert_eq!(lines, vec!["2.5"]);
    }

    #[tokio::test]
    async fn test_run_logged_ignores_failure_markers() {
        let launcher = MockLauncher::new();
        launcher.push(ScriptedLaunch::with_lines(["error: this stage is not classified"]));

        let executor = StageExecutor::new(&launcher);
        let result = executor.run_logged("preflight", &spec()).await.unwrap();

        assert!(result.passed());
        assert!(result.diagnostics.is_empty());
    }
}
