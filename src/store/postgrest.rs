//! PostgREST record store.
//!
//! Talks to a PostgREST endpoint (the REST layer Supabase exposes under
//! `/rest/v1`) to insert and update rows of the timing table.
//!
//! # Example
//!
//! ```rust,no_run
//! use session_timing::store::{PostgrestStore, PostgrestStoreConfig, RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PostgrestStoreConfig {
//!         base_url: "https://project.supabase.co".to_string(),
//!         api_key: "anon-key".to_string(),
//!         table: "session_timing".to_string(),
//!         timeout_secs: 30,
//!     };
//!     let store = PostgrestStore::new(config)?;
//!     let id = store.create(chrono::Utc::now()).await?;
//!     println!("created {}", id);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RecordId, RecordStore, StoreError};

/// Connection settings for a PostgREST table.
#[derive(Debug, Clone)]
pub struct PostgrestStoreConfig {
    /// Project base URL, without the `/rest/v1` suffix.
    pub base_url: String,
    /// API key sent as both `apikey` and bearer token.
    pub api_key: String,
    /// Target table name.
    pub table: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct InsertTiming {
    start_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct CloseTiming {
    end_time: DateTime<Utc>,
    duration: i64,
}

#[derive(Debug, Deserialize)]
struct ReturnedRow {
    id: RecordId,
}

/// Record store backed by a PostgREST table.
pub struct PostgrestStore {
    client: Client,
    config: PostgrestStoreConfig,
}

impl PostgrestStore {
    /// Creates a new store client.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Http` if the HTTP client cannot be created.
    pub fn new(config: PostgrestStoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// The table URL all requests target.
    pub fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.table
        )
    }

    /// Builds a request with authentication headers.
    fn build_request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
    }

    async fn returned_rows(response: reqwest::Response) -> Result<Vec<ReturnedRow>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            StoreError::MalformedResponse(format!("expected an array of rows: {}", e))
        })
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    async fn create(&self, start_time: DateTime<Utc>) -> Result<RecordId, StoreError> {
        let response = self
            .build_request(Method::POST)
            .json(&InsertTiming { start_time })
            .send()
            .await?;

        let row = Self::returned_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::MalformedResponse("insert returned no rows".to_string()))?;

        debug!(record_id = %row.id, table = %self.config.table, "Inserted timing row");
        Ok(row.id)
    }

    async fn update(
        &self,
        id: &RecordId,
        end_time: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        let filter = format!("eq.{}", id);
        let response = self
            .build_request(Method::PATCH)
            .query(&[("id", filter.as_str())])
            .json(&CloseTiming {
                end_time,
                duration: duration_ms,
            })
            .send()
            .await?;

        let rows = Self::returned_rows(response).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        debug!(record_id = %id, duration_ms, "Updated timing row");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> PostgrestStoreConfig {
        PostgrestStoreConfig {
            base_url: base_url.to_string(),
            api_key: "anon".to_string(),
            table: "session_timing".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_store_new() {
        assert!(PostgrestStore::new(config("http://localhost:54321")).is_ok());
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let store = PostgrestStore::new(config("https://abc.supabase.co/")).unwrap();
        assert_eq!(
            store.table_url(),
            "https://abc.supabase.co/rest/v1/session_timing"
        );
    }

    #[test]
    fn test_close_timing_serialization() {
        let body = CloseTiming {
            end_time: "2025-01-15T10:00:05Z".parse().unwrap(),
            duration: 5000,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"duration\":5000"));
        assert!(json.contains("\"end_time\":\"2025-01-15T10:00:05Z\""));
    }
}
