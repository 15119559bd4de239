//! In-process record store.
//!
//! Used by `--dry-run` and tests. Identifiers are assigned sequentially
//! starting at 1, the way an identity column would.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

use super::{RecordId, RecordStore, SessionTiming, StoreError};

/// Record store that keeps rows in memory.
///
/// # Examples
///
/// ```
/// use session_timing::store::{MemoryStore, RecordStore};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// let id = store.create(chrono::Utc::now()).await.unwrap();
/// store.update(&id, chrono::Utc::now(), 1200).await.unwrap();
/// assert_eq!(store.get(&id).unwrap().duration, Some(1200));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<SessionTiming>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row, in insertion order.
    pub fn records(&self) -> Vec<SessionTiming> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }

    /// Look up a single row.
    pub fn get(&self, id: &RecordId) -> Option<SessionTiming> {
        self.rows
            .lock()
            .ok()
            .and_then(|rows| rows.iter().find(|row| &row.id == id).cloned())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, start_time: DateTime<Utc>) -> Result<RecordId, StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;

        let id = RecordId::new((rows.len() + 1).to_string());
        rows.push(SessionTiming {
            id: id.clone(),
            start_time,
            end_time: None,
            duration: None,
        });
        Ok(id)
    }

    async fn update(
        &self,
        id: &RecordId,
        end_time: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;

        let row = rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row.end_time = Some(end_time);
        row.duration = Some(duration_ms);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let now = Utc::now();
        assert_eq!(store.create(now).await.unwrap(), RecordId::new("1"));
        assert_eq!(store.create(now).await.unwrap(), RecordId::new("2"));
        assert_eq!(store.records().len(), 2);
    }

    #[tokio::test]
    async fn test_update_closes_row() {
        let store = MemoryStore::new();
        let start: DateTime<Utc> = "2025-01-15T10:00:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2025-01-15T10:00:05Z".parse().unwrap();

        let id = store.create(start).await.unwrap();
        store.update(&id, end, 5000).await.unwrap();

        let row = store.get(&id).unwrap();
        assert_eq!(row.end_time, Some(end));
        assert_eq!(row.duration, Some(5000));
        assert!(!row.is_open());
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let result = store.update(&RecordId::new("99"), Utc::now(), 1).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
