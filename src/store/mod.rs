//! Record store abstraction for session timing rows
//!
//! The timer only ever issues two calls against the backing table: one
//! `create` when a session opens and one `update` when it closes. This
//! module defines that seam plus the record and error types shared by the
//! concrete stores.
//!
//! # Modules
//!
//! - [`postgrest`]: PostgREST (Supabase REST) backed store
//! - [`memory`]: In-process store used for dry runs and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

pub mod memory;
pub mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::{PostgrestStore, PostgrestStoreConfig};

/// Errors returned by record store calls.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body returned by the backend.
        message: String,
    },

    /// The backend answered but the body was not what we expected.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The record targeted by an update does not exist.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The store cannot serve requests right now.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Opaque identifier assigned by the backing store on create.
///
/// PostgREST tables commonly use either a bigint identity or a uuid
/// primary key, so both numbers and strings are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as sent back to the store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(n) => RecordId(n.to_string()),
            RawId::Text(s) => RecordId(s),
        })
    }
}

/// One row of the `session_timing` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTiming {
    /// Store-assigned identifier.
    pub id: RecordId,
    /// When the session opened.
    pub start_time: DateTime<Utc>,
    /// When the session closed; absent while open.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// `end_time - start_time` in milliseconds; absent while open.
    #[serde(default)]
    pub duration: Option<i64>,
}

impl SessionTiming {
    /// Whether the record still lacks an end time.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Backing store for session timing records.
///
/// Implementations must be safe to share across the tasks that handle
/// individual lifecycle messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new open record and return its identifier.
    async fn create(&self, start_time: DateTime<Utc>) -> Result<RecordId, StoreError>;

    /// Close an existing record with its end time and duration.
    async fn update(
        &self,
        id: &RecordId,
        end_time: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_from_number() {
        let id: RecordId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn test_record_id_from_string() {
        let id: RecordId =
            serde_json::from_str("\"5f0c6c1e-8a8e-4c39-9d8b-2f6f1f0f6c11\"").unwrap();
        assert_eq!(id.to_string(), "5f0c6c1e-8a8e-4c39-9d8b-2f6f1f0f6c11");
    }

    #[test]
    fn test_session_timing_row_deserialization() {
        let json = r#"{
            "id": 7,
            "start_time": "2025-01-15T10:00:00Z",
            "end_time": null,
            "duration": null
        }"#;

        let row: SessionTiming = serde_json::from_str(json).unwrap();
        assert_eq!(row.id, RecordId::new("7"));
        assert!(row.is_open());
    }

    #[test]
    fn test_session_timing_row_without_optional_columns() {
        let json = r#"{"id": "B2", "start_time": "2025-01-15T10:00:00+00:00"}"#;
        let row: SessionTiming = serde_json::from_str(json).unwrap();
        assert_eq!(row.duration, None);
        assert!(row.is_open());
    }

    #[test]
    fn test_api_error_display() {
        let error = StoreError::Api {
            status: 401,
            message: "invalid api key".to_string(),
        };
        assert_eq!(error.to_string(), "API error (401): invalid api key");
    }
}
