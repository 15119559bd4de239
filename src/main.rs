//! session-timing - streaming embed session timer
//!
#![doc = "Main entry point for the session-timing binary."]

use anyhow::Result;
use std::path::Path;

use session_timing::cli::{Cli, Commands};
use session_timing::commands;
use session_timing::config::{Config, StoreKind};
use session_timing::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let mut config = Config::load(config_path, &cli)?;

    // Dry runs never touch the remote table
    let dry_run = matches!(
        cli.command,
        Commands::Serve { dry_run: true, .. } | Commands::Replay { dry_run: true, .. }
    );
    if dry_run {
        config.store.kind = StoreKind::Memory;
    }

    init_logging(&config.logging)?;
    if !Path::new(config_path).exists() {
        tracing::warn!("Config file not found at {}, using defaults", config_path);
    }

    // The loader needs no store, so `embed` skips store validation
    if !matches!(cli.command, Commands::Embed { .. }) {
        config.validate()?;
    }

    // Execute command
    match cli.command {
        Commands::Serve { bind, dry_run } => {
            tracing::info!(dry_run, "Starting relay server");
            commands::serve::run_serve(config, bind).await?;
            Ok(())
        }
        Commands::Replay { input, json, .. } => {
            tracing::debug!("Replaying messages from: {}", input.display());
            commands::replay::run_replay(config, &input, json).await?;
            Ok(())
        }
        Commands::Embed { relay_url } => {
            commands::embed::print_embed(config, relay_url)?;
            Ok(())
        }
    }
}
