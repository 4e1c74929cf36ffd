//! Covstash CLI Library
//!
//! Command-line front end for the covstash coverage library: list the
//! files a run would instrument, wrap a command so its processes record
//! coverage, and merge the per-process snapshots into reports.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)] // String building is clear and correct
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{Cli, ColorArg, Commands, ReportArgs, ReportFormat, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity, DEFAULT_INSTRUMENTER};
pub use error::{CliError, CliResult};
pub use output::StatusPrinter;
