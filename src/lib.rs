//! session-timing - streaming embed session timer library
//!
//! This library records how long visitors keep a third-party avatar
//! streaming embed open. It injects the embed loader into a host page,
//! listens for the widget's `show`/`hide` lifecycle messages and writes
//! one timing row per session to a remote table.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `timer`: Session state machine, signal handlers, mount/teardown
//! - `embed`: Widget messages, origin filtering, loader script, page and bus seams
//! - `store`: Record store abstraction with PostgREST and in-memory backends
//! - `server`: HTTP relay bridging a browser page to the timer
//! - `commands`: CLI command handlers
//! - `config`: Configuration management and validation
//! - `logging`: Tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use session_timing::config::FailurePolicy;
//! use session_timing::store::MemoryStore;
//! use session_timing::timer::SessionTimer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let timer = SessionTimer::new(Arc::new(MemoryStore::new()), FailurePolicy::StayOpen);
//!     timer.on_show().await;
//!     timer.on_hide().await;
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod embed;
pub mod error;
pub mod logging;
pub mod server;
pub mod store;
pub mod timer;

// Re-export commonly used types
pub use config::Config;
pub use error::{ProtocolViolation, Result, SessionTimingError};
pub use store::{RecordId, RecordStore, SessionTiming, StoreError};
pub use timer::{MountedTimer, SessionState, SessionTimer};
