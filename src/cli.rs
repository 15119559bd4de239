//! Command-line interface definition for session-timing
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to serve the relay, replay recorded messages and
//! print the embed loader.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// session-timing - record streaming embed sessions to a remote table
#[derive(Parser, Debug, Clone)]
#[command(name = "session-timing")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Mount a timer and relay browser messages to it until Ctrl-C
    Serve {
        /// Override the listen address from config
        #[arg(short, long)]
        bind: Option<String>,

        /// Keep records in memory instead of the configured store
        #[arg(long)]
        dry_run: bool,
    },

    /// Feed newline-delimited messages through a timer
    Replay {
        /// File of JSON messages, one per line, or `-` for stdin
        input: PathBuf,

        /// Keep records in memory instead of the configured store
        #[arg(long)]
        dry_run: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the embed loader script
    Embed {
        /// Relay endpoint the loader should forward messages to
        #[arg(long)]
        relay_url: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
