//! Covstash CLI: multi-process JavaScript coverage
//!
//! ## Usage
//!
//! ```bash
//! covstash run -- npm test        # Run with coverage, then report
//! covstash report -r json         # Merge snapshots into coverage/
//! covstash ls                     # Files that would be instrumented
//! covstash clean                  # Remove the snapshot directory
//! ```

use clap::Parser;
use covstash_cli::{
    handlers, logging, Cli, CliConfig, CliResult, ColorChoice, Commands, StatusPrinter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    // Build configuration from CLI args
    let config = build_config(&cli);
    logging::init(&config);
    let printer = StatusPrinter::new(config.color.should_color(), config.verbosity.is_quiet());

    match cli.command {
        Commands::Report(args) => handlers::execute_report(&config, &args, &printer)?,
        Commands::Ls => handlers::execute_ls(&config)?,
        Commands::Clean => handlers::execute_clean(&config, &printer)?,
        Commands::ClearCache => handlers::execute_clear_cache(&config, &printer)?,
        Commands::Run(args) => {
            let code = handlers::execute_run(&config, &args, &printer)?;
            return Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn build_config(cli: &Cli) -> CliConfig {
    let verbosity = if cli.quiet {
        Verbosity::Quiet
    } else {
        match cli.verbose {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    };

    let color: ColorChoice = cli.color.clone().into();

    CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_log_json(cli.log_json)
        .with_cwd(&cli.cwd)
        .with_cache(cli.cache)
        .with_instrumenter(&cli.instrumenter)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_verbosity() {
        let cli = Cli::parse_from(["covstash", "ls"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Normal);

        let cli = Cli::parse_from(["covstash", "-v", "ls"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Verbose);

        let cli = Cli::parse_from(["covstash", "-vvv", "ls"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Debug);

        let cli = Cli::parse_from(["covstash", "-q", "-v", "ls"]);
        assert_eq!(build_config(&cli).verbosity, Verbosity::Quiet);
    }

    #[test]
    fn test_build_config_project_flags() {
        let cli = Cli::parse_from([
            "covstash",
            "--cwd",
            "/proj",
            "--cache",
            "--instrumenter",
            "node inst.js",
            "clean",
        ]);
        let config = build_config(&cli);
        assert_eq!(config.cwd, std::path::PathBuf::from("/proj"));
        assert!(config.enable_cache);
        assert_eq!(config.instrumenter, "node inst.js");
    }
}
