//! xcdrive - staged Xcode build pipelines for CI
//!
//! This library runs an Xcode build as a sequence of dependent stages:
//! tool preflight, optional version stamping via `agvtool`, the
//! `xcodebuild` invocation with live output classification, and optional
//! IPA packaging of the built application bundles.
//!
//! # Core Concepts
//!
//! - **Pipeline**: An ordered run of stages where each failure aborts the
//!   remainder; the result is a trail of per-stage outcomes
//! - **Classification**: Tool output is scanned line by line while it
//!   streams, so a build that exits cleanly but printed failure markers is
//!   still reported as failed
//! - **Seams**: Process launching, the workspace file system, and the build
//!   environment sit behind traits, so the whole pipeline runs against
//!   scripted fakes in tests
//!
//! # Example Usage
//!
//! ```ignore
//! use xcdrive::config::{BuildConfiguration, CiEnvironment, ToolPaths};
//! use xcdrive::fs::StdFs;
//! use xcdrive::launcher::SystemLauncher;
//! use xcdrive::pipeline::Orchestrator;
//!
//! async fn run_build(workspace: std::path::PathBuf) -> bool {
//!     let tools = ToolPaths::resolve(None, None);
//!     let environment = CiEnvironment::new(None);
//!     let launcher = SystemLauncher::new();
//!     let orchestrator = Orchestrator::new(&tools, workspace, &StdFs, &launcher, &environment);
//!
//!     let config = BuildConfiguration {
//!         build_ipa: true,
//!         ..Default::default()
//!     };
//!     orchestrator.run(&config).await.succeeded()
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`pipeline`]: Orchestrator, stage sequencing and error taxonomy
//! - [`launcher`]: Process launching seam with system and mock backends
//! - [`classify`]: Streaming output classifier
//! - [`package`]: IPA packaging of built bundles

// Public modules
pub mod classify;
pub mod cli;
pub mod config;
pub mod executor;
pub mod fs;
pub mod invocation;
pub mod launcher;
pub mod package;
pub mod pipeline;

// Re-export key types for convenient access
pub use classify::{OutputClassifier, Verdict};
pub use config::{BuildConfiguration, BuildEnvironment, CiEnvironment, ConfigError, ToolPaths};
pub use executor::{StageExecutor, StageResult};
pub use fs::{StdFs, WorkspaceFs};
pub use invocation::BuildInvocation;
pub use launcher::{CommandSpec, LaunchError, ProcessLauncher, SystemLauncher};
pub use pipeline::{Orchestrator, PipelineError, PipelineOutcome, PipelineRun};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
