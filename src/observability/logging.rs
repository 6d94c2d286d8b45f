//! # Logging
//!
//! Installs the global tracing subscriber. `RUST_LOG` wins when set; otherwise
//! the configured level applies to every target. Output is JSON unless the
//! format is `text`.

use crate::config::ControllerConfig;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.to_lowercase()))
        .with_context(|| format!("Invalid log level {:?}", config.log_level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.log_format.eq_ignore_ascii_case("text") {
        builder.try_init()
    } else {
        builder.json().with_current_span(true).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}
