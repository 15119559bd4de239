//! Error types for session-timing
//!
//! This module defines the crate-level error enum and the protocol
//! violation taxonomy, using `thiserror` for ergonomic error handling.
//! Store-layer failures live in [`crate::store::StoreError`].

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for session-timing operations
///
/// Covers configuration loading, record store calls, embed injection,
/// the relay server and the usual I/O and serialization failures.
#[derive(Error, Debug)]
pub enum SessionTimingError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Record store call failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A lifecycle message arrived in a state that cannot accept it
    #[error("Protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),

    /// Embed script injection or removal failed
    #[error("Embed error: {0}")]
    Embed(String),

    /// Relay server errors (bind, serve)
    #[error("Server error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Lifecycle signals that arrive out of order.
///
/// These are never surfaced to the embed widget; the timer logs them as
/// warnings and leaves its state untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// `show` received while a session is already open
    #[error("show received while a session is already open")]
    AlreadyOpen,

    /// `hide` received while no session is open
    #[error("hide received while no session is open")]
    NotOpen,

    /// `hide` received for an open session whose record was never created
    #[error("hide received but the open session holds no record id")]
    MissingRecordId,

    /// `hide` received while the update for the open session is in flight
    #[error("hide received while the session is already closing")]
    CloseInProgress,
}

/// Result type alias for session-timing operations
///
/// Uses `anyhow::Error` so callers get rich context on the way up to
/// the binary.
pub type Result<T> = anyhow::Result<T>;
