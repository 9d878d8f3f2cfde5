//! Tracing subscriber setup

use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter directive for the configured level; `verbose` forces debug output
/// for this crate
#[must_use]
pub fn filter_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        format!("{},hyperlocal_weather_map=debug", config.level)
    } else {
        config.level.clone()
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the config.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config, verbose)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        };
        assert_eq!(filter_directive(&config, false), "warn");
        assert_eq!(
            filter_directive(&config, true),
            "warn,hyperlocal_weather_map=debug"
        );
    }
}
