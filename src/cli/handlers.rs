//! Command handlers
//!
//! Each handler wires the concrete collaborators (real file system, real
//! process launcher, process environment) into the library types, runs the
//! command and maps the result to a process exit code.

use std::env;
use std::path::PathBuf;
use tracing::{debug, error, info};

use crate::cli::commands::{BuildArgs, ConfigArgs};
use crate::cli::output::OutputFormatter;
use crate::config::{non_empty, BuildConfiguration, CiEnvironment, ToolPaths};
use crate::fs::StdFs;
use crate::launcher::SystemLauncher;
use crate::pipeline::Orchestrator;

/// Exit code for configuration errors, distinct from a failed build
const EXIT_CONFIG_ERROR: i32 = 2;

pub async fn handle_build(args: &BuildArgs, quiet: bool, _verbose: bool) -> i32 {
    info!("Starting build pipeline");

    let workspace_path = args
        .workspace_path
        .clone()
        .unwrap_or_else(|| env::current_dir().expect("Failed to get current directory"));

    debug!("Workspace path: {}", workspace_path.display());

    if !workspace_path.exists() {
        error!(
            "Workspace path does not exist: {}",
            workspace_path.display()
        );
        return EXIT_CONFIG_ERROR;
    }

    if !workspace_path.is_dir() {
        error!(
            "Workspace path is not a directory: {}",
            workspace_path.display()
        );
        return EXIT_CONFIG_ERROR;
    }

    let workspace_path: PathBuf = match workspace_path.canonicalize() {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to canonicalize workspace path: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };
    debug!("Canonicalized workspace path: {}", workspace_path.display());

    let config = BuildConfiguration {
        build_ipa: args.ipa,
        clean_before_build: args.clean,
        update_build_number: args.update_build_number,
        configuration: non_empty(args.configuration.clone())
            .unwrap_or_else(|| BuildConfiguration::default().configuration),
        target: non_empty(args.target.clone()),
        sdk: non_empty(args.sdk.clone()),
        project_subpath: non_empty(args.project_subpath.clone()),
        project_file: non_empty(args.project_file.clone()),
    };
    if let Err(e) = config.validate() {
        error!("FATAL: {}", e);
        return EXIT_CONFIG_ERROR;
    }

    let tools = ToolPaths::resolve(args.xcodebuild_path.clone(), args.agvtool_path.clone());
    if let Err(e) = tools.validate() {
        error!("FATAL: {}", e);
        return EXIT_CONFIG_ERROR;
    }
    debug!("Resolved tools: {:?}", tools);

    let environment = CiEnvironment::new(args.build_number);
    let fs = StdFs;
    let launcher = SystemLauncher::new();
    let orchestrator = Orchestrator::new(&tools, workspace_path, &fs, &launcher, &environment);

    let run = orchestrator.run(&config).await;

    let formatter = OutputFormatter::new(args.format.into());
    match formatter.format_run(&run) {
        Ok(output) => {
            if !quiet {
                println!("{}", output);
            }
        }
        Err(e) => {
            error!("Failed to format pipeline result: {}", e);
            return 1;
        }
    }

    if run.succeeded() {
        0
    } else {
        1
    }
}

pub async fn handle_config(args: &ConfigArgs) -> i32 {
    let tools = ToolPaths::resolve(args.xcodebuild_path.clone(), args.agvtool_path.clone());
    if let Err(e) = tools.validate() {
        error!("FATAL: {}", e);
        return EXIT_CONFIG_ERROR;
    }

    let formatter = OutputFormatter::new(args.format.into());
    match formatter.format_config(&tools, &BuildConfiguration::default()) {
        Ok(output) => {
            println!("{}", output);
            0
        }
        Err(e) => {
            error!("Failed to format configuration: {}", e);
            1
        }
    }
}
