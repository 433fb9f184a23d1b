//! # Cumulus CLI
//!
//! Drives a compute context against the mock provider: lists locations,
//! creates node groups and reclaims them, and runs the network experiment
//! lifecycle end to end.
//!
//! ## Usage
//! ```bash
//! cumulus --config /etc/cumulus/cumulus.yaml run --group web --count 3 --teardown
//! cumulus --log-format json experiment --group lab
//! ```

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use cumulus_compute::MockProvider;

mod cli;
mod commands;
mod config;

use cli::Args;
use config::{Config, DEFAULT_CONFIG_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let (config, source) = match &args.config {
        // Explicit config file provided
        Some(config_path) => (Config::load(config_path)?, config_path.as_str()),
        // Try default location, fall back to defaults
        None => match Config::load(DEFAULT_CONFIG_PATH) {
            Ok(cfg) => (cfg, DEFAULT_CONFIG_PATH),
            Err(_) => (Config::default(), "defaults"),
        },
    };
    let config = config.with_cli_overrides(&args)?;
    config.validate()?;

    // Initialize logging
    cumulus_common::init_logging_with_format(&config.log_level, config.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %source,
        "Starting cumulus"
    );

    let provider = Arc::new(MockProvider::new());
    if let Err(e) = commands::execute(&config, args.command, provider).await {
        error!(error = %e, "Command failed");
        return Err(e);
    }

    Ok(())
}
