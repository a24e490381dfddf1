//! Streaming build output classification
//!
//! xcodebuild can exit 0 while a target inside a multi-target build failed
//! to compile or link, so the exit code alone is not a trustworthy success
//! signal. The classifier scans the tool's output one line at a time for
//! known failure markers and keeps its own verdict, which the stage executor
//! combines with the exit code: the classifier can demote a clean exit to a
//! failure, never the other way around.
//!
//! The classifier is deliberately line-oriented with no multi-line state.
//! Once a failure marker is seen the verdict is Fail for good, but the sink
//! keeps accepting lines so the producing process is always fully drained.

use crate::launcher::LineSink;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Pass/fail judgment derived from scanning tool output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

fn failure_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // clang/swift diagnostics: "path/file.m:12:5: error: ..." and
            // "fatal error: 'header.h' file not found"
            r"\b(?:fatal )?error:",
            // terminal failure banner
            r"^\*\* BUILD FAILED \*\*",
            // failure summary emitted after partial multi-target builds
            r"^The following build commands failed",
            // linker failures
            r"^Undefined symbols for architecture",
            r"^ld: symbol\(s\) not found",
            // tool wrapper failures that can leave the exit code clean
            r"^Command .+ failed with exit code",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

fn warning_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\bwarning:").expect("valid regex"))
}

/// Stateful sink that classifies a build tool's output stream
///
/// Feed every line of the stream, then read [`verdict`](Self::verdict) and
/// [`summary`](Self::summary) once the stream is exhausted. An empty stream
/// is a pass.
#[derive(Debug, Default)]
pub struct OutputClassifier {
    failed: bool,
    summary: Vec<String>,
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one line of tool output
    ///
    /// Never refuses input: lines after a failure marker are still examined
    /// for the summary so the stream can be drained completely.
    pub fn feed(&mut self, line: &str) {
        let line = line.trim_end_matches(['\n', '\r']);
        if failure_patterns().iter().any(|p| p.is_match(line)) {
            self.failed = true;
            self.summary.push(line.to_string());
        } else if warning_pattern().is_match(line) {
            self.summary.push(line.to_string());
        }
    }

    /// The verdict for the stream consumed so far
    pub fn verdict(&self) -> Verdict {
        if self.failed {
            Verdict::Fail
        } else {
            Verdict::Pass
        }
    }

    /// Captured error and warning lines, in stream order
    pub fn summary(&self) -> &[String] {
        &self.summary
    }

    pub fn into_summary(self) -> Vec<String> {
        self.summary
    }
}

impl LineSink for OutputClassifier {
    fn feed_line(&mut self, line: &str) {
        self.feed(line);
    }
}
