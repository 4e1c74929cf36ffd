//! Ls command handler

use super::open_session;
use crate::config::CliConfig;
use crate::error::CliResult;
use covstash::interceptor::relative_path;
use covstash::Session;

/// Relative paths of every file the session would instrument
#[must_use]
pub fn list_files(session: &Session) -> Vec<String> {
    let cwd = &session.config().cwd;
    session
        .matching_files()
        .iter()
        .map(|path| relative_path(cwd, path))
        .collect()
}

/// Execute the ls command
pub fn execute_ls(config: &CliConfig) -> CliResult<()> {
    let session = open_session(config)?;
    for file in list_files(&session) {
        println!("{file}");
    }
    Ok(())
}
