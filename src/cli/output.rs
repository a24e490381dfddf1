//! Output formatting for pipeline results
//!
//! Two formats: JSON for machine consumption and a human-readable stage
//! table. The live tool output goes to stderr via tracing as the pipeline
//! runs; the formatter only renders the final result on stdout.

use anyhow::{Context, Result};
use serde_json::json;

use crate::classify::Verdict;
use crate::config::{BuildConfiguration, ToolPaths};
use crate::pipeline::PipelineRun;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// Human-readable formatted text
    Human,
}

/// Output formatter for pipeline runs and resolved configuration
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Creates a new output formatter with the specified format
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a finished pipeline run
    pub fn format_run(&self, run: &PipelineRun) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(run).context("Failed to serialize pipeline run")
            }
            OutputFormat::Human => Ok(self.format_run_human(run)),
        }
    }

    /// Formats the resolved tool paths and build settings
    pub fn format_config(&self, tools: &ToolPaths, config: &BuildConfiguration) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let output = json!({
                    "tools": tools,
                    "build": config,
                });
                serde_json::to_string_pretty(&output)
                    .context("Failed to serialize configuration")
            }
            OutputFormat::Human => Ok(Self::format_config_human(tools, config)),
        }
    }

    fn format_run_human(&self, run: &PipelineRun) -> String {
        let mut out = String::new();

        let outcome = if run.succeeded() { "SUCCEEDED" } else { "FAILED" };
        out.push_str(&format!(
            "Build {} in {} ms\n\n",
            outcome,
            run.duration_ms()
        ));

        out.push_str("Stages:\n");
        for stage in &run.stages {
            let verdict = match stage.verdict {
                Verdict::Pass => "pass",
                Verdict::Fail => "FAIL",
            };
            out.push_str(&format!(
                "  {:<16} exit {:<4} {}\n",
                stage.name, stage.exit_code, verdict
            ));
            for line in &stage.diagnostics {
                out.push_str(&format!("    {}\n", line));
            }
        }

        out
    }

    fn format_config_human(tools: &ToolPaths, config: &BuildConfiguration) -> String {
        let mut out = String::new();
        out.push_str("Tools:\n");
        out.push_str(&format!("  xcodebuild: {}\n", tools.xcodebuild.display()));
        out.push_str(&format!("  agvtool:    {}\n", tools.agvtool.display()));
        out.push_str("\nBuild:\n");
        out.push_str(&format!(
            "  configuration:       {}\n",
            config.configuration
        ));
        out.push_str(&format!(
            "  target:              {}\n",
            config.target.as_deref().unwrap_or("ALL")
        ));
        out.push_str(&format!(
            "  sdk:                 {}\n",
            config.sdk.as_deref().unwrap_or("DEFAULT")
        ));
        out.push_str(&format!(
            "  project file:        {}\n",
            config.project_file.as_deref().unwrap_or("DEFAULT")
        ));
        out.push_str(&format!(
            "  project subpath:     {}\n",
            config.project_subpath.as_deref().unwrap_or(".")
        ));
        out.push_str(&format!(
            "  clean before build:  {}\n",
            if config.clean_before_build { "YES" } else { "NO" }
        ));
        out.push_str(&format!(
            "  update build number: {}\n",
            if config.update_build_number { "YES" } else { "NO" }
        ));
        out.push_str(&format!(
            "  build IPA:           {}\n",
            if config.build_ipa { "YES" } else { "NO" }
        ));
        out
    }
}
