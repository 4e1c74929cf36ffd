//! Command handlers, one module per subcommand

pub mod clean;
pub mod ls;
pub mod report;
pub mod run;

pub use clean::{execute_clean, execute_clear_cache};
pub use ls::{execute_ls, list_files};
pub use report::{execute_report, render_json, render_text, CliReporter, FINAL_REPORT};
pub use run::{child_env, execute_run};

use crate::config::CliConfig;
use crate::error::CliResult;
use covstash::{CommandInstrumenter, CovConfig, Session};
use std::sync::Arc;

/// Session over the project described by `config`
pub fn open_session(config: &CliConfig) -> CliResult<Session> {
    open_session_with(config, config.coverage_config()?)
}

/// Session with an already adjusted coverage configuration
pub fn open_session_with(config: &CliConfig, coverage: CovConfig) -> CliResult<Session> {
    let engine = CommandInstrumenter::parse(&config.instrumenter)?;
    Ok(Session::new(coverage, Arc::new(engine))?)
}
