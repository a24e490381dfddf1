use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command line driver for Xcode build pipelines
#[derive(Parser, Debug)]
#[command(
    name = "xcdrive",
    about = "Drives xcodebuild pipelines with version stamping and IPA packaging",
    version,
    author,
    long_about = "xcdrive runs an Xcode build as a staged pipeline: tool preflight, \
                  optional version stamping via agvtool, the xcodebuild invocation with \
                  live output classification, and optional IPA packaging of the built \
                  application bundles."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Increase verbosity (can be used multiple times)"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the build pipeline against a workspace",
        long_about = "Runs the full pipeline against an Xcode workspace: tool preflight, \
                      optional version stamping, the classified xcodebuild invocation, \
                      and optional IPA packaging.\n\n\
                      Examples:\n  \
                      xcdrive build\n  \
                      xcdrive build /path/to/workspace\n  \
                      xcdrive build -c Debug -t MyApp --clean\n  \
                      xcdrive build --ipa --update-build-number --format json"
    )]
    Build(BuildArgs),

    #[command(
        about = "Show the resolved configuration",
        long_about = "Resolves tool paths and build settings from flags, environment \
                      variables and defaults, and prints the result without running \
                      anything.\n\n\
                      Examples:\n  \
                      xcdrive config\n  \
                      xcdrive config --format json"
    )]
    Config(ConfigArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to the workspace (defaults to current directory)"
    )]
    pub workspace_path: Option<PathBuf>,

    #[arg(
        short = 'c',
        long,
        value_name = "NAME",
        help = "Build configuration to pass to xcodebuild (defaults to Release)"
    )]
    pub configuration: Option<String>,

    #[arg(
        short = 't',
        long,
        value_name = "NAME",
        help = "Target to build (omit to build all targets)"
    )]
    pub target: Option<String>,

    #[arg(long, value_name = "NAME", help = "SDK to build against")]
    pub sdk: Option<String>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Subdirectory of the workspace containing the Xcode project"
    )]
    pub project_subpath: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Project file to pass to xcodebuild (for directories with several)"
    )]
    pub project_file: Option<String>,

    #[arg(long, help = "Run a clean before the build")]
    pub clean: bool,

    #[arg(
        long,
        help = "Stamp CFBundleVersion from the marketing version and build number"
    )]
    pub update_build_number: bool,

    #[arg(long, help = "Package built .app bundles into .ipa archives")]
    pub ipa: bool,

    #[arg(
        long,
        value_name = "FILE",
        value_parser = path_buf_parser(),
        help = "Path to the xcodebuild binary (defaults to /usr/bin/xcodebuild)"
    )]
    pub xcodebuild_path: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        value_parser = path_buf_parser(),
        help = "Path to the agvtool binary (defaults to /usr/bin/agvtool)"
    )]
    pub agvtool_path: Option<PathBuf>,

    #[arg(
        long,
        value_name = "NUMBER",
        help = "Build number for version stamping (defaults to $BUILD_NUMBER)"
    )]
    pub build_number: Option<u64>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

/// Accepts empty values, unlike clap's default `PathBuf` parser; empty tool
/// paths are rejected later by `ToolPaths` validation.
fn path_buf_parser() -> clap::builder::MapValueParser<
    clap::builder::OsStringValueParser,
    fn(std::ffi::OsString) -> PathBuf,
> {
    use clap::builder::TypedValueParser;
    clap::builder::OsStringValueParser::new().map(PathBuf::from)
}

#[derive(Parser, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(
        long,
        value_name = "FILE",
        value_parser = path_buf_parser(),
        help = "Path to the xcodebuild binary (defaults to /usr/bin/xcodebuild)"
    )]
    pub xcodebuild_path: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        value_parser = path_buf_parser(),
        help = "Path to the agvtool binary (defaults to /usr/bin/agvtool)"
    )]
    pub agvtool_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
