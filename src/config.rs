//! Configuration management for session-timing
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::embed::OriginMatch;
use crate::error::{Result, SessionTimingError};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Main configuration structure for session-timing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Streaming embed settings
    #[serde(default)]
    pub embed: EmbedConfig,
    /// Record store settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Relay server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Session timer behavior
    #[serde(default)]
    pub timer: TimerConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Streaming embed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Widget host the iframe is loaded from
    #[serde(default = "default_embed_host")]
    pub host: String,

    /// Opaque share token identifying the avatar configuration
    #[serde(default)]
    pub share: String,

    /// Origin whose messages drive the timer; defaults to `host`
    #[serde(default)]
    pub trusted_origin: Option<String>,

    /// How inbound origins are compared with the trusted origin
    #[serde(default)]
    pub origin_match: OriginMatch,

    /// Relay endpoint the loader forwards lifecycle messages to
    #[serde(default)]
    pub relay_url: Option<String>,
}

fn default_embed_host() -> String {
    "https://labs.heygen.com".to_string()
}

impl EmbedConfig {
    /// The origin messages must come from.
    pub fn trusted_origin(&self) -> &str {
        self.trusted_origin.as_deref().unwrap_or(&self.host)
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            host: default_embed_host(),
            share: String::new(),
            trusted_origin: None,
            origin_match: OriginMatch::default(),
            relay_url: None,
        }
    }
}

/// Which record store backs the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// PostgREST / Supabase REST table
    #[default]
    Postgrest,
    /// In-process store; nothing is persisted
    Memory,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store backend
    #[serde(default)]
    pub kind: StoreKind,

    /// Project base URL (without `/rest/v1`)
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Table holding timing rows
    #[serde(default = "default_table")]
    pub table: String,

    /// Request timeout (seconds)
    #[serde(default = "default_store_timeout")]
    pub timeout_seconds: u64,
}

fn default_table() -> String {
    "session_timing".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            url: None,
            api_key: None,
            table: default_table(),
            timeout_seconds: default_store_timeout(),
        }
    }
}

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the relay listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// What the timer does when a store call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the session open: a failed create keeps it open without a
    /// record, a failed update keeps it open so a later `hide` retries
    #[default]
    StayOpen,
    /// Return to closed so the next `show` starts a fresh session
    Close,
}

/// Session timer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Reaction to failed store calls
    #[serde(default)]
    pub on_store_failure: FailurePolicy,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Optional file to append logs to, in addition to stderr
    #[serde(default)]
    pub file_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SessionTimingError::Config(format!("Failed to read config file: {}", e))
        })?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SessionTimingError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Some(url) = env_first(&["SESSION_TIMING_STORE_URL", "SUPABASE_URL"]) {
            self.store.url = Some(url);
        }

        if let Some(key) = env_first(&["SESSION_TIMING_STORE_KEY", "SUPABASE_ANON_KEY"]) {
            self.store.api_key = Some(key);
        }

        if let Ok(table) = std::env::var("SESSION_TIMING_STORE_TABLE") {
            self.store.table = table;
        }

        if let Ok(origin) = std::env::var("SESSION_TIMING_TRUSTED_ORIGIN") {
            self.embed.trusted_origin = Some(origin);
        }

        if let Ok(bind) = std::env::var("SESSION_TIMING_BIND") {
            self.server.bind = bind;
        }

        if let Ok(level) = std::env::var("SESSION_TIMING_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let trusted = self.embed.trusted_origin();
        match url::Url::parse(trusted) {
            Ok(url) if url.host_str().is_some() => {}
            _ => {
                return Err(SessionTimingError::Config(format!(
                    "embed.trusted_origin must be a URL with a host: {}",
                    trusted
                ))
                .into())
            }
        }

        if self.store.table.trim().is_empty() {
            return Err(SessionTimingError::Config("store.table cannot be empty".to_string()).into());
        }

        if self.store.timeout_seconds == 0 {
            return Err(SessionTimingError::Config(
                "store.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.store.kind == StoreKind::Postgrest {
            let url = self.store.url.as_deref().ok_or_else(|| {
                SessionTimingError::Config("store.url is required for the postgrest store".to_string())
            })?;
            let parsed = url::Url::parse(url).map_err(|e| {
                SessionTimingError::Config(format!("Invalid store.url {}: {}", url, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SessionTimingError::Config(format!(
                    "store.url must be http or https: {}",
                    url
                ))
                .into());
            }
            if self.store.api_key.as_deref().unwrap_or("").is_empty() {
                return Err(SessionTimingError::Config(
                    "store.api_key is required for the postgrest store".to_string(),
                )
                .into());
            }
        }

        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(SessionTimingError::Config(format!(
                "server.bind is not a socket address: {}",
                self.server.bind
            ))
            .into());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(SessionTimingError::Config(format!(
                "Invalid logging.level: {}. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}
