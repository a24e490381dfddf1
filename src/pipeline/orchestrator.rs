//! Pipeline orchestrator
//!
//! Sequences the build stages in fixed order and aborts at the first
//! failing one:
//!
//! ```text
//! ToolPreflight -> VersionStamp (optional) -> Build -> Package (optional)
//! ```
//!
//! Stages run strictly sequentially: each depends on the workspace state
//! the previous one left behind. A stage that is skipped by configuration
//! does not appear in the result trail. Once a stage fails, no later
//! stage's process is ever launched.

use super::{PipelineError, PipelineOutcome, PipelineRun};
use crate::classify::Verdict;
use crate::config::{BuildConfiguration, BuildEnvironment, ConfigError, ToolPaths};
use crate::executor::{StageExecutor, StageResult};
use crate::fs::WorkspaceFs;
use crate::invocation::BuildInvocation;
use crate::launcher::{CommandSpec, ProcessLauncher};
use crate::package;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Stage names as they appear in the result trail
const STAGE_PREFLIGHT: &str = "preflight";
const STAGE_VERSION_QUERY: &str = "version-query";
const STAGE_VERSION_SET: &str = "version-set";
const STAGE_BUILD: &str = "build";
const STAGE_PACKAGE: &str = "package";

/// Drives one build pipeline run
///
/// All collaborators are injected: tool paths and workspace root resolved
/// at startup, plus the file system, process launcher and build-environment
/// seams so the whole pipeline runs against fakes in tests.
pub struct Orchestrator<'a> {
    tools: &'a ToolPaths,
    workspace_root: PathBuf,
    fs: &'a dyn WorkspaceFs,
    launcher: &'a dyn ProcessLauncher,
    environment: &'a dyn BuildEnvironment,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        tools: &'a ToolPaths,
        workspace_root: impl Into<PathBuf>,
        fs: &'a dyn WorkspaceFs,
        launcher: &'a dyn ProcessLauncher,
        environment: &'a dyn BuildEnvironment,
    ) -> Self {
        Self {
            tools,
            workspace_root: workspace_root.into(),
            fs,
            launcher,
            environment,
        }
    }

    /// Runs the whole pipeline and returns the stage trail plus outcome
    ///
    /// Never panics and never returns early without a well-defined
    /// workspace state: the packaging stage cleans up its staging
    /// directory on both paths, and a failing stage leaves later stages
    /// untouched.
    pub async fn run(&self, config: &BuildConfiguration) -> PipelineRun {
        let started_at = Utc::now();
        let mut stages = Vec::new();

        let outcome = match self.run_stages(config, &mut stages).await {
            Ok(()) => PipelineOutcome::Succeeded,
            Err(err) => {
                error!("FATAL: {}", err);
                // Stages that failed without producing a process result
                // still show up in the trail.
                let already_recorded = matches!(
                    err,
                    PipelineError::ToolInvocation { .. } | PipelineError::ClassifiedFailure { .. }
                );
                if !already_recorded {
                    stages.push(StageResult {
                        name: err.stage().to_string(),
                        exit_code: -1,
                        verdict: Verdict::Fail,
                        diagnostics: vec![err.to_string()],
                    });
                }
                PipelineOutcome::Failed
            }
        };

        PipelineRun {
            started_at,
            finished_at: Utc::now(),
            stages,
            outcome,
        }
    }

    async fn run_stages(
        &self,
        config: &BuildConfiguration,
        stages: &mut Vec<StageResult>,
    ) -> Result<(), PipelineError> {
        let project_root = match &config.project_subpath {
            Some(subpath) => self.workspace_root.join(subpath),
            None => self.workspace_root.clone(),
        };
        info!("Working directory is {}", project_root.display());

        let executor = StageExecutor::new(self.launcher);
        let env = self.environment.vars();

        self.preflight(&executor, &project_root, &env, stages).await?;

        if config.update_build_number {
            self.stamp_version(&executor, &project_root, &env, stages)
                .await?;
        }

        self.build(config, &executor, &project_root, &env, stages)
            .await?;

        if config.build_ipa {
            self.package_artifacts(config, &project_root, stages)?;
        }

        Ok(())
    }

    /// Verifies the configured tools exist, then probes the build tool's
    /// version as the first launched process
    async fn preflight(
        &self,
        executor: &StageExecutor<'_>,
        project_root: &Path,
        env: &HashMap<String, String>,
        stages: &mut Vec<StageResult>,
    ) -> Result<(), PipelineError> {
        for (tool, path) in [
            ("xcodebuild", &self.tools.xcodebuild),
            ("agvtool", &self.tools.agvtool),
        ] {
            if !self.fs.exists(path) {
                return Err(ConfigError::ToolNotFound {
                    tool,
                    path: path.display().to_string(),
                }
                .into());
            }
        }

        let spec = CommandSpec::new(&self.tools.xcodebuild, project_root)
            .arg("-version")
            .envs(env.clone());
        let result = executor
            .run_logged(STAGE_PREFLIGHT, &spec)
            .await
            .map_err(|e| PipelineError::launch(STAGE_PREFLIGHT, e))?;
        let exit_code = result.exit_code;
        let passed = result.passed();
        stages.push(result);
        if !passed {
            return Err(PipelineError::ToolInvocation {
                stage: STAGE_PREFLIGHT.to_string(),
                exit_code,
            });
        }
        Ok(())
    }

    /// Queries the marketing version and stamps
    /// `<marketing version>.<build number>` into the project
    async fn stamp_version(
        &self,
        executor: &StageExecutor<'_>,
        project_root: &Path,
        env: &HashMap<String, String>,
        stages: &mut Vec<StageResult>,
    ) -> Result<(), PipelineError> {
        info!("Updating version number");

        let spec = CommandSpec::new(&self.tools.agvtool, project_root)
            .args(["mvers", "-terse1"])
            .envs(env.clone());
        let (result, lines) = executor
            .run_captured(STAGE_VERSION_QUERY, &spec)
            .await
            .map_err(|e| PipelineError::launch(STAGE_VERSION_QUERY, e))?;
        let exit_code = result.exit_code;
        let passed = result.passed();
        stages.push(result);
        if !passed {
            return Err(PipelineError::ToolInvocation {
                stage: STAGE_VERSION_QUERY.to_string(),
                exit_code,
            });
        }

        let marketing_version = lines
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .to_string();
        let new_version = format!("{}.{}", marketing_version, self.environment.build_number());
        info!(
            "CFBundleShortVersionString is {} so new CFBundleVersion will be {}",
            marketing_version, new_version
        );

        let spec = CommandSpec::new(&self.tools.agvtool, project_root)
            .args(["new-version", "-all", &new_version])
            .envs(env.clone());
        let result = executor
            .run_logged(STAGE_VERSION_SET, &spec)
            .await
            .map_err(|e| PipelineError::launch(STAGE_VERSION_SET, e))?;
        let exit_code = result.exit_code;
        let passed = result.passed();
        stages.push(result);
        if !passed {
            return Err(PipelineError::ToolInvocation {
                stage: STAGE_VERSION_SET.to_string(),
                exit_code,
            });
        }
        Ok(())
    }

    /// Runs xcodebuild with the configured arguments and classifies its
    /// output; a clean exit code with failure markers in the output still
    /// fails the stage
    async fn build(
        &self,
        config: &BuildConfiguration,
        executor: &StageExecutor<'_>,
        project_root: &Path,
        env: &HashMap<String, String>,
        stages: &mut Vec<StageResult>,
    ) -> Result<(), PipelineError> {
        let invocation = BuildInvocation::from_config(self.tools, config);
        info!("Going to invoke xcodebuild: {}", invocation.description);

        let spec = CommandSpec::from_argv(&invocation.argv, project_root).envs(env.clone());
        let result = executor
            .run_classified(STAGE_BUILD, &spec)
            .await
            .map_err(|e| PipelineError::launch(STAGE_BUILD, e))?;
        let exit_code = result.exit_code;
        let verdict = result.verdict;
        stages.push(result);

        if exit_code != 0 {
            return Err(PipelineError::ToolInvocation {
                stage: STAGE_BUILD.to_string(),
                exit_code,
            });
        }
        if verdict == Verdict::Fail {
            return Err(PipelineError::ClassifiedFailure {
                stage: STAGE_BUILD.to_string(),
            });
        }
        Ok(())
    }

    /// Packages built bundles into archives under the configuration's
    /// output directory
    fn package_artifacts(
        &self,
        config: &BuildConfiguration,
        project_root: &Path,
        stages: &mut Vec<StageResult>,
    ) -> Result<(), PipelineError> {
        info!("Packaging IPA");
        let build_dir = project_root
            .join("build")
            .join(format!("{}-iphoneos", config.configuration));

        let archives = package::package_bundles(self.fs, &build_dir)
            .map_err(|source| PipelineError::Packaging { source })?;

        stages.push(StageResult {
            name: STAGE_PACKAGE.to_string(),
            exit_code: 0,
            verdict: Verdict::Pass,
            diagnostics: archives,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticEnvironment;
    use crate::fs::StdFs;
    use crate::launcher::{MockLauncher, ScriptedLaunch};
    use std::fs as stdfs;
    use tempfile::TempDir;

    /// Workspace with fake tool binaries so preflight passes
    fn workspace_with_tools() -> (TempDir, ToolPaths) {
        let tmp = TempDir::new().unwrap();
        let xcodebuild = tmp.path().join("xcodebuild");
        let agvtool = tmp.path().join("agvtool");
        stdfs::write(&xcodebuild, b"#!/bin/sh\n").unwrap();
        stdfs::write(&agvtool, b"#!/bin/sh\n").unwrap();
        let tools = ToolPaths {
            xcodebuild,
            agvtool,
        };
        (tmp, tools)
    }

    fn environment() -> StaticEnvironment {
        StaticEnvironment::new(42)
    }

    #[tokio::test]
    async fn test_successful_minimal_run() {
        let (tmp, tools) = workspace_with_tools();
        let launcher = MockLauncher::new();
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let run = orchestrator.run(&BuildConfiguration::default()).await;

        assert!(run.succeeded());
        let names: Vec<_> = run.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["preflight", "build"]);
        // -version probe then the build
        assert_eq!(launcher.launch_count(), 2);
        assert_eq!(launcher.invocations()[0].args, vec!["-version"]);
    }

    #[tokio::test]
    async fn test_missing_tool_launches_nothing() {
        let tmp = TempDir::new().unwrap();
        let tools = ToolPaths {
            xcodebuild: tmp.path().join("missing-xcodebuild"),
            agvtool: tmp.path().join("missing-agvtool"),
        };
        let launcher = MockLauncher::new();
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let run = orchestrator.run(&BuildConfiguration::default()).await;

        assert!(!run.succeeded());
        assert_eq!(launcher.launch_count(), 0);
        assert_eq!(run.stages.len(), 1);
        assert_eq!(run.stages[0].name, "preflight");
        assert!(run.stages[0].diagnostics[0].contains("Cannot find xcodebuild"));
    }

    #[tokio::test]
    async fn test_version_stamp_composes_new_version() {
        let (tmp, tools) = workspace_with_tools();
        let launcher = MockLauncher::new();
        launcher.push_all([
            ScriptedLaunch::success(),             // preflight -version
            ScriptedLaunch::with_lines(["2.5"]),   // mvers query
            ScriptedLaunch::success(),             // new-version set
            ScriptedLaunch::success(),             // build
        ]);
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let config = BuildConfiguration {
            update_build_number: true,
            ..Default::default()
        };
        let run = orchestrator.run(&config).await;

        assert!(run.succeeded());
        let invocations = launcher.invocations();
        assert_eq!(invocations[1].args, vec!["mvers", "-terse1"]);
        assert_eq!(invocations[2].args, vec!["new-version", "-all", "2.5.42"]);
    }

    #[tokio::test]
    async fn test_version_query_failure_skips_build() {
        let (tmp, tools) = workspace_with_tools();
        let launcher = MockLauncher::new();
        launcher.push_all([
            ScriptedLaunch::success(),
            ScriptedLaunch::failure(1), // mvers query fails
        ]);
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let config = BuildConfiguration {
            update_build_number: true,
            ..Default::default()
        };
        let run = orchestrator.run(&config).await;

        assert!(!run.succeeded());
        // preflight + failed query, no new-version and no build
        assert_eq!(launcher.launch_count(), 2);
        let names: Vec<_> = run.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["preflight", "version-query"]);
    }

    #[tokio::test]
    async fn test_classified_failure_overrides_clean_exit_and_skips_package() {
        let (tmp, tools) = workspace_with_tools();
        let launcher = MockLauncher::new();
        launcher.push_all([
            ScriptedLaunch::success(),
            ScriptedLaunch::with_lines([
                "CompileC main.o main.m",
                "main.m:10:1: error: use of undeclared identifier 'foo'",
                "** BUILD SUCCEEDED **",
            ]),
        ]);
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let config = BuildConfiguration {
            build_ipa: true,
            ..Default::default()
        };
        let run = orchestrator.run(&config).await;

        assert!(!run.succeeded());
        let build = run.stages.iter().find(|s| s.name == "build").unwrap();
        assert_eq!(build.exit_code, 0);
        assert_eq!(build.verdict, Verdict::Fail);
        // package stage never entered
        assert!(run.stages.iter().all(|s| s.name != "package"));
        assert!(!tmp.path().join("build/Release-iphoneos/Payload").exists());
    }

    #[tokio::test]
    async fn test_build_exit_code_failure() {
        let (tmp, tools) = workspace_with_tools();
        let launcher = MockLauncher::new();
        launcher.push_all([ScriptedLaunch::success(), ScriptedLaunch::failure(65)]);
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let run = orchestrator.run(&BuildConfiguration::default()).await;

        assert!(!run.succeeded());
        let build = run.stages.iter().find(|s| s.name == "build").unwrap();
        assert_eq!(build.exit_code, 65);
    }

    #[tokio::test]
    async fn test_package_stage_produces_archives() {
        let (tmp, tools) = workspace_with_tools();
        let out_dir = tmp.path().join("build/Release-iphoneos");
        stdfs::create_dir_all(out_dir.join("Demo.app")).unwrap();
        stdfs::write(out_dir.join("Demo.app/Info.plist"), b"<plist/>").unwrap();

        let launcher = MockLauncher::new();
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let config = BuildConfiguration {
            build_ipa: true,
            ..Default::default()
        };
        let run = orchestrator.run(&config).await;

        assert!(run.succeeded());
        let package = run.stages.iter().find(|s| s.name == "package").unwrap();
        assert_eq!(package.diagnostics, vec!["Demo.ipa"]);
        assert!(out_dir.join("Demo.ipa").is_file());
        assert!(!out_dir.join("Payload").exists());
    }

    #[tokio::test]
    async fn test_project_subpath_resolves_working_directory() {
        let (tmp, tools) = workspace_with_tools();
        stdfs::create_dir_all(tmp.path().join("ios/app")).unwrap();

        let launcher = MockLauncher::new();
        let env = environment();
        let orchestrator = Orchestrator::new(&tools, tmp.path(), &StdFs, &launcher, &env);

        let config = BuildConfiguration {
            project_subpath: Some("ios/app".to_string()),
            ..Default::default()
        };
        let run = orchestrator.run(&config).await;

        assert!(run.succeeded());
        let expected = tmp.path().join("ios/app");
        for invocation in launcher.invocations() {
            assert_eq!(invocation.cwd(), expected.as_path());
        }
    }
}
