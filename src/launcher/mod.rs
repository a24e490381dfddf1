//! Process launching abstraction
//!
//! Every external tool invocation goes through the [`ProcessLauncher`]
//! trait: the pipeline hands it a fully resolved [`CommandSpec`] and a
//! [`LineSink`], and gets back the exit code once the process has terminated
//! and its output has been fully drained. The trait seam keeps the pipeline
//! testable with a scripted launcher that never spawns anything.

pub mod mock;
pub mod system;

pub use mock::{MockLauncher, ScriptedLaunch};
pub use system::SystemLauncher;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A fully resolved external command: program, arguments, environment and
/// working directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: cwd.into(),
        }
    }

    /// Builds a spec from a complete argument vector, program first
    pub fn from_argv(argv: &[String], cwd: impl Into<PathBuf>) -> Self {
        let (program, args) = argv.split_first().expect("argv is never empty");
        Self {
            program: PathBuf::from(program),
            args: args.to_vec(),
            env: HashMap::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Program and arguments joined for log lines
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Consumer for one line of process output, without its trailing newline
pub trait LineSink: Send {
    fn feed_line(&mut self, line: &str);
}

/// Process launch errors
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The program could not be started at all
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The output pipes could not be read
    #[error("Failed to read process output: {0}")]
    Stream(#[from] std::io::Error),
}

/// Runs a command, streaming its output line-by-line into the sink while the
/// process executes, and returns the exit code after termination
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self, spec: &CommandSpec, sink: &mut dyn LineSink)
        -> Result<i32, LaunchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/usr/bin".to_string());

        let spec = CommandSpec::new("/usr/bin/xcodebuild", "/workspace")
            .arg("-version")
            .envs(env);

        assert_eq!(spec.program, PathBuf::from("/usr/bin/xcodebuild"));
        assert_eq!(spec.args, vec!["-version"]);
        assert_eq!(spec.cwd(), Path::new("/workspace"));
        assert_eq!(spec.env.get("PATH").unwrap(), "/usr/bin");
    }

    #[test]
    fn test_command_spec_from_argv() {
        let argv = vec![
            "/usr/bin/xcodebuild".to_string(),
            "-alltargets".to_string(),
            "build".to_string(),
        ];
        let spec = CommandSpec::from_argv(&argv, "/workspace");

        assert_eq!(spec.program, PathBuf::from("/usr/bin/xcodebuild"));
        assert_eq!(spec.args, vec!["-alltargets", "build"]);
    }

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("/usr/bin/agvtool", "/ws").args(["mvers", "-terse1"]);
        assert_eq!(spec.display(), "/usr/bin/agvtool mvers -terse1");
    }
}
