//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Covstash: multi-process JavaScript coverage collection and reporting
#[derive(Parser, Debug)]
#[command(name = "covstash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Project root
    #[arg(long, default_value = ".", global = true)]
    pub cwd: PathBuf,

    /// Cache instrumented output on disk
    #[arg(long, global = true)]
    pub cache: bool,

    /// Command line of the instrumentation engine
    #[arg(
        long,
        env = "COVSTASH_INSTRUMENTER",
        default_value = crate::config::DEFAULT_INSTRUMENTER,
        global = true
    )]
    pub instrumenter: String,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge every process snapshot and render reports
    Report(ReportArgs),

    /// List the files that would be instrumented
    Ls,

    /// Remove the snapshot directory
    Clean,

    /// Remove the transform cache
    ClearCache,

    /// Run a command with coverage collection enabled, then report
    Run(RunArgs),
}

/// Arguments for the report command
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Report formats; defaults to the configured reporters
    #[arg(short, long = "reporter", value_enum)]
    pub reporters: Vec<ReportFormat>,

    /// Directory for file-based reports
    #[arg(short, long, default_value = "coverage")]
    pub output: PathBuf,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Skip reporting after the command exits
    #[arg(long)]
    pub no_report: bool,

    /// Report formats; defaults to the configured reporters
    #[arg(short, long = "reporter", value_enum)]
    pub reporters: Vec<ReportFormat>,

    /// Directory for file-based reports
    #[arg(short, long, default_value = "coverage")]
    pub output: PathBuf,

    /// Command to run, after `--`
    #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

impl RunArgs {
    /// Report arguments carried by this run
    #[must_use]
    pub fn report_args(&self) -> ReportArgs {
        ReportArgs {
            reporters: self.reporters.clone(),
            output: self.output.clone(),
        }
    }
}

/// Report output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    /// Per-file hit counts on stdout
    Text,
    /// Merged coverage map as `coverage-final.json`
    Json,
}

impl ReportFormat {
    /// Parse a reporter name from configuration
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Name used in configuration
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Color argument for CLI
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
