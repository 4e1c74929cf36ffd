//! Run command handler
//!
//! Spawns the wrapped command with the `COVSTASH_*` environment so every
//! cooperating process in its tree flushes into the shared snapshot
//! directory, then merges and reports once the command exits.

use super::{execute_report, open_session};
use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::StatusPrinter;
use covstash::config::{ENV_CACHE, ENV_CWD};
use covstash::CovConfig;
use std::process::{Command, ExitStatus};

/// Environment variable naming the instrumenter for child processes
pub const ENV_INSTRUMENTER: &str = "COVSTASH_INSTRUMENTER";

/// Variables handed to the wrapped command
#[must_use]
pub fn child_env(coverage: &CovConfig, instrumenter: &str) -> Vec<(&'static str, String)> {
    let mut env = vec![
        (ENV_CWD, coverage.cwd.display().to_string()),
        (ENV_INSTRUMENTER, instrumenter.to_string()),
    ];
    if coverage.enable_cache {
        env.push((ENV_CACHE, "enable".to_string()));
    }
    env
}

/// Shell-style exit code of a finished child
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Execute the run command and return the wrapped command's exit code
pub fn execute_run(config: &CliConfig, args: &RunArgs, printer: &StatusPrinter) -> CliResult<i32> {
    let (program, rest) = args
        .command
        .split_first()
        .ok_or_else(|| CliError::invalid_argument("no command given"))?;

    let session = open_session(config)?;
    session.reset()?;

    tracing::info!(command = %args.command.join(" "), "running with coverage");
    let status = Command::new(program)
        .args(rest)
        .current_dir(&session.config().cwd)
        .envs(child_env(session.config(), &config.instrumenter))
        .status()
        .map_err(|e| CliError::command(format!("cannot start '{program}': {e}")))?;

    let code = exit_code(status);
    if code != 0 {
        printer.warning(&format!("command exited with status {code}"));
    }

    if !args.no_report {
        execute_report(config, &args.report_args(), printer)?;
    }
    Ok(code)
}
