//! Log subscriber setup.
//!
//! `RUST_LOG` wins over the `-v`/`-q` derived filter. Everything goes to
//! stderr so report output on stdout stays machine-readable.

use crate::config::CliConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter for `config`, honoring `RUST_LOG` when set
#[must_use]
pub fn env_filter(config: &CliConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.log_directive()))
}

/// Install the global subscriber.
///
/// A second call is ignored so tests and embedders can call it freely.
pub fn init(config: &CliConfig) {
    let registry = tracing_subscriber::registry().with(env_filter(config));

    let result = if config.log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(config.color.should_color())
                    .with_target(false)
                    .compact(),
            )
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColorChoice, Verbosity};

    #[test]
    fn test_init_twice_is_harmless() {
        let config = CliConfig::new()
            .with_verbosity(Verbosity::Debug)
            .with_color(ColorChoice::Never);
        init(&config);
        init(&config.with_log_json(true));
    }

    #[test]
    fn test_filter_builds_for_every_level() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Debug,
        ] {
            let config = CliConfig::new().with_verbosity(verbosity);
            let _ = env_filter(&config);
        }
    }
}
