//! xcodebuild invocation builder
//!
//! Turns a validated [`BuildConfiguration`] into the exact argument vector
//! for one xcodebuild run, plus a single-line summary of every resolved
//! choice for the operator log. The argument order is fixed by the tool's
//! grammar: options first, action tokens (`clean`, `build`) last.

use crate::config::{BuildConfiguration, ToolPaths};

/// A fully resolved xcodebuild command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    /// Complete argument vector, program path first
    pub argv: Vec<String>,

    /// Human-readable summary of the resolved choices, for logging only
    pub description: String,
}

impl BuildInvocation {
    /// Builds the argument vector and description for a build run
    ///
    /// All configuration fields are optional with documented defaults, so
    /// this cannot fail.
    pub fn from_config(tools: &ToolPaths, config: &BuildConfiguration) -> Self {
        let mut argv = vec![tools.xcodebuild.to_string_lossy().into_owned()];
        let mut description = String::new();

        match &config.target {
            Some(target) => {
                argv.push("-target".to_string());
                argv.push(target.clone());
                description.push_str(&format!("target: {}", target));
            }
            None => {
                argv.push("-alltargets".to_string());
                description.push_str("target: ALL");
            }
        }

        match &config.sdk {
            Some(sdk) => {
                argv.push("-sdk".to_string());
                argv.push(sdk.clone());
                description.push_str(&format!(", sdk: {}", sdk));
            }
            None => description.push_str(", sdk: DEFAULT"),
        }

        match &config.project_file {
            Some(project) => {
                argv.push("-project".to_string());
                argv.push(project.clone());
                description.push_str(&format!(", project: {}", project));
            }
            None => description.push_str(", project: DEFAULT"),
        }

        argv.push("-configuration".to_string());
        argv.push(config.configuration.clone());
        description.push_str(&format!(", configuration: {}", config.configuration));

        if config.clean_before_build {
            argv.push("clean".to_string());
            description.push_str(", clean: YES");
        } else {
            description.push_str(", clean: NO");
        }
        argv.push("build".to_string());

        Self { argv, description }
    }
}
