//! Structured logging setup
//!
//! Builds the `tracing-subscriber` pipeline from [`LoggingConfig`]: an
//! `EnvFilter` seeded with the configured level (overridable through
//! `RUST_LOG`) and a `compact`, `pretty` or `json` formatter.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Filter for the configured level. `verbose` forces DEBUG.
pub fn env_filter(config: &LoggingConfig, verbose: bool) -> Result<EnvFilter> {
    let level = if verbose {
        Level::DEBUG
    } else {
        config
            .level
            .to_lowercase()
            .parse::<Level>()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))?
    };

    Ok(EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy())
}

/// Install the global subscriber, writing to stderr. Fails if one is
/// already installed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<()> {
    let filter = env_filter(config, verbose)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format.to_lowercase().as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.pretty().try_init(),
        _ => builder.compact().try_init(),
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}
