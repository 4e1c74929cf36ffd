//! Clean and clear-cache command handlers

use super::open_session;
use crate::config::CliConfig;
use crate::error::CliResult;
use crate::output::StatusPrinter;

/// Execute the clean command
pub fn execute_clean(config: &CliConfig, printer: &StatusPrinter) -> CliResult<()> {
    let session = open_session(config)?;
    session.cleanup()?;
    printer.success(&format!("removed {}", session.temp_dir().display()));
    Ok(())
}

/// Execute the clear-cache command
pub fn execute_clear_cache(config: &CliConfig, printer: &StatusPrinter) -> CliResult<()> {
    let session = open_session(config)?;
    session.clear_cache()?;
    printer.success(&format!("cleared {}", session.cache_dir().display()));
    Ok(())
}
