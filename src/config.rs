//! Configuration for a build pipeline run
//!
//! Two configuration scopes exist, mirroring how CI servers split settings:
//!
//! - [`BuildConfiguration`] is the per-run, user-chosen configuration (target,
//!   SDK, clean, packaging, ...). It is constructed once per run and never
//!   mutated afterwards. Every boolean has an explicit default of `false`;
//!   absent optional fields have documented tool-default semantics.
//! - [`ToolPaths`] is process-wide: the resolved paths to the `xcodebuild`
//!   and `agvtool` executables, set at startup from flags or environment
//!   variables and read-only during a run.
//!
//! # Environment Variables
//!
//! - `XCDRIVE_XCODEBUILD_PATH`: xcodebuild path - default: "/usr/bin/xcodebuild"
//! - `XCDRIVE_AGVTOOL_PATH`: agvtool path - default: "/usr/bin/agvtool"
//! - `BUILD_NUMBER`: CI build number used for version stamping - default: 0
//! - `XCDRIVE_LOG_LEVEL`: logging level - default: "info"

use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Default values for configuration
const DEFAULT_CONFIGURATION: &str = "Release";
const DEFAULT_XCODEBUILD_PATH: &str = "/usr/bin/xcodebuild";
const DEFAULT_AGVTOOL_PATH: &str = "/usr/bin/agvtool";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Build configuration name is empty
    #[error("Please specify a configuration")]
    MissingConfiguration,

    /// xcodebuild path is empty
    #[error("Please specify the path to the xcodebuild executable (usually /usr/bin/xcodebuild)")]
    MissingXcodebuildPath,

    /// agvtool path is empty
    #[error("Please specify the path to the agvtool executable (usually /usr/bin/agvtool)")]
    MissingAgvtoolPath,

    /// A configured tool path does not exist on the workspace file system
    #[error("Cannot find {tool} with the configured path {path}")]
    ToolNotFound { tool: &'static str, path: String },
}

/// Per-run build configuration
///
/// `None` values have tool-default semantics: no `target` means all targets
/// (`-alltargets`), no `sdk` means the tool's default SDK, no `project_file`
/// means xcodebuild auto-discovers the project, no `project_subpath` means
/// the workspace root itself is the project root.
#[derive(Debug, Clone, Serialize)]
pub struct BuildConfiguration {
    /// Package the built bundles into .ipa archives after a successful build
    pub build_ipa: bool,

    /// Run the `clean` action before `build`
    pub clean_before_build: bool,

    /// Stamp `CFBundleVersion` with `<marketing version>.<build number>`
    pub update_build_number: bool,

    /// Build configuration name (e.g. "Release", "Debug")
    pub configuration: String,

    /// Target to build; `None` builds all targets
    pub target: Option<String>,

    /// SDK to build against; `None` uses the tool default
    pub sdk: Option<String>,

    /// Path of the project directory relative to the workspace root
    pub project_subpath: Option<String>,

    /// Project file name; `None` lets xcodebuild auto-discover it
    pub project_file: Option<String>,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self {
            build_ipa: false,
            clean_before_build: false,
            update_build_number: false,
            configuration: DEFAULT_CONFIGURATION.to_string(),
            target: None,
            sdk: None,
            project_subpath: None,
            project_file: None,
        }
    }
}

impl BuildConfiguration {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` with a human-readable complaint for the first
    /// missing required field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.configuration.trim().is_empty() {
            return Err(ConfigError::MissingConfiguration);
        }
        Ok(())
    }
}

/// Normalizes an optional CLI/env string: empty and whitespace-only values
/// collapse to `None` so absent and blank fields behave identically.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Process-wide tool paths, resolved once at startup
#[derive(Debug, Clone, Serialize)]
pub struct ToolPaths {
    /// Path to the xcodebuild executable
    pub xcodebuild: PathBuf,

    /// Path to the agvtool executable used for version stamping
    pub agvtool: PathBuf,
}

impl ToolPaths {
    /// Resolves tool paths from explicit overrides, falling back to the
    /// `XCDRIVE_XCODEBUILD_PATH` / `XCDRIVE_AGVTOOL_PATH` environment
    /// variables and then to the usual install locations.
    pub fn resolve(xcodebuild: Option<PathBuf>, agvtool: Option<PathBuf>) -> Self {
        let xcodebuild = xcodebuild
            .or_else(|| env::var("XCDRIVE_XCODEBUILD_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_XCODEBUILD_PATH));
        let agvtool = agvtool
            .or_else(|| env::var("XCDRIVE_AGVTOOL_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AGVTOOL_PATH));
        Self { xcodebuild, agvtool }
    }

    /// Validates that both tool paths are non-empty
    ///
    /// Existence on the file system is checked later by the pipeline
    /// preflight stage, against the workspace file system.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.xcodebuild.as_os_str().is_empty() {
            return Err(ConfigError::MissingXcodebuildPath);
        }
        if self.agvtool.as_os_str().is_empty() {
            return Err(ConfigError::MissingAgvtoolPath);
        }
        Ok(())
    }
}

/// Supplies the environment and build number for the current run
pub trait BuildEnvironment: Send + Sync {
    /// Environment variables passed to every launched tool
    fn vars(&self) -> HashMap<String, String>;

    /// CI build number used to compose the stamped version
    fn build_number(&self) -> u64;
}

/// Build environment backed by the process environment
///
/// The build number comes from an explicit override if given, otherwise from
/// the standard `BUILD_NUMBER` CI variable, otherwise 0 with a warning.
pub struct CiEnvironment {
    build_number: u64,
}

impl CiEnvironment {
    pub fn new(build_number_override: Option<u64>) -> Self {
        let build_number = build_number_override
            .or_else(|| env::var("BUILD_NUMBER").ok().and_then(|v| v.parse().ok()))
            .unwrap_or_else(|| {
                warn!("BUILD_NUMBER is not set, using build number 0");
                0
            });
        Self { build_number }
    }
}

impl BuildEnvironment for CiEnvironment {
    fn vars(&self) -> HashMap<String, String> {
        env::vars().collect()
    }

    fn build_number(&self) -> u64 {
        self.build_number
    }
}

/// Fixed build environment for tests and scripted runs
pub struct StaticEnvironment {
    pub vars: HashMap<String, String>,
    pub build_number: u64,
}

impl StaticEnvironment {
    pub fn new(build_number: u64) -> Self {
        Self {
            vars: HashMap::new(),
            build_number,
        }
    }
}

impl BuildEnvironment for StaticEnvironment {
    fn vars(&self) -> HashMap<String, String> {
        self.vars.clone()
    }

    fn build_number(&self) -> u64 {
        self.build_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn test_default_configuration() {
        let config = BuildConfiguration::default();

        assert!(!config.build_ipa);
        assert!(!config.clean_before_build);
        assert!(!config.update_build_number);
        assert_eq!(config.configuration, "Release");
        assert!(config.target.is_none());
        assert!(config.sdk.is_none());
        assert!(config.project_subpath.is_none());
        assert!(config.project_file.is_none());
    }

    #[test]
    fn test_validate_empty_configuration_name() {
        let config = BuildConfiguration {
            configuration: "  ".to_string(),
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Please specify a configuration");
    }

    #[test]
    fn test_non_empty_normalization() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(
            non_empty(Some("Debug".to_string())),
            Some("Debug".to_string())
        );
    }

    #[test]
    #[serial]
    fn test_tool_paths_defaults() {
        let _guards = vec![
            EnvGuard::unset("XCDRIVE_XCODEBUILD_PATH"),
            EnvGuard::unset("XCDRIVE_AGVTOOL_PATH"),
        ];

        let tools = ToolPaths::resolve(None, None);
        assert_eq!(tools.xcodebuild, PathBuf::from("/usr/bin/xcodebuild"));
        assert_eq!(tools.agvtool, PathBuf::from("/usr/bin/agvtool"));
        assert!(tools.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_tool_paths_from_env() {
        let _guards = vec![
            EnvGuard::set("XCDRIVE_XCODEBUILD_PATH", "/opt/xcode/xcodebuild"),
            EnvGuard::set("XCDRIVE_AGVTOOL_PATH", "/opt/xcode/agvtool"),
        ];

        let tools = ToolPaths::resolve(None, None);
        assert_eq!(tools.xcodebuild, PathBuf::from("/opt/xcode/xcodebuild"));
        assert_eq!(tools.agvtool, PathBuf::from("/opt/xcode/agvtool"));
    }

    #[test]
    #[serial]
    fn test_tool_paths_override_beats_env() {
        let _guard = EnvGuard::set("XCDRIVE_XCODEBUILD_PATH", "/opt/xcode/xcodebuild");

        let tools = ToolPaths::resolve(Some(PathBuf::from("/custom/xcodebuild")), None);
        assert_eq!(tools.xcodebuild, PathBuf::from("/custom/xcodebuild"));
    }

    #[test]
    fn test_tool_paths_validation_messages() {
        let tools = ToolPaths {
            xcodebuild: PathBuf::new(),
            agvtool: PathBuf::from("/usr/bin/agvtool"),
        };
        assert!(tools
            .validate()
            .unwrap_err()
            .to_string()
            .contains("xcodebuild executable"));

        let tools = ToolPaths {
            xcodebuild: PathBuf::from("/usr/bin/xcodebuild"),
            agvtool: PathBuf::new(),
        };
        assert!(tools
            .validate()
            .unwrap_err()
            .to_string()
            .contains("agvtool executable"));
    }

    #[test]
    #[serial]
    fn test_ci_environment_build_number_from_env() {
        let _guard = EnvGuard::set("BUILD_NUMBER", "42");
        let environment = CiEnvironment::new(None);
        assert_eq!(environment.build_number(), 42);
    }

    #[test]
    #[serial]
    fn test_ci_environment_build_number_override() {
        let _guard = EnvGuard::set("BUILD_NUMBER", "42");
        let environment = CiEnvironment::new(Some(7));
        assert_eq!(environment.build_number(), 7);
    }

    #[test]
    #[serial]
    fn test_ci_environment_build_number_missing() {
        let _guard = EnvGuard::unset("BUILD_NUMBER");
        let environment = CiEnvironment::new(None);
        assert_eq!(environment.build_number(), 0);
    }

    #[test]
    fn test_static_environment() {
        let environment = StaticEnvironment::new(5);
        assert_eq!(environment.build_number(), 5);
        assert!(environment.vars().is_empty());
    }
}
