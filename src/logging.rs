use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{AdapterError, AdapterResult};

/// Install the global `tracing` subscriber. Call once at process start.
///
/// `config.level` is an `EnvFilter` directive (`info`, `lakehouse_adapter=debug`, ...).
/// `config.style` is `always`, `never` or `auto` for ANSI colours.
pub fn init(config: &LoggingConfig) -> AdapterResult<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi(&config.style))
        .try_init()
        .map_err(|e| AdapterError::Internal(format!("Failed to initialize logging: {}", e)))
}

fn use_ansi(style: &str) -> bool {
    match style.to_ascii_lowercase().as_str() {
        "always" => true,
        "never" => false,
        _ => std::io::stderr().is_terminal(),
    }
}
