//! Logging initialization.
//!
//! Sets up structured logging with tracing and optional JSON output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber. `RUST_LOG`, when set, overrides
/// `log_level`. Fails if a subscriber is already installed.
pub fn init_telemetry(log_level: &str, json_format: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty())
            .try_init()?;
    }

    Ok(())
}

pub fn init_from_config(config: &LoggingConfig) -> anyhow::Result<()> {
    init_telemetry(&config.level, config.json)
}
