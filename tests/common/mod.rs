use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Semaphore;

use session_timing::store::{RecordId, RecordStore, StoreError};

/// Record store that records every call and answers from a script.
///
/// Creates answer with sequential ids unless a result was queued. When
/// gated, each create waits for a permit before answering.
#[derive(Default)]
#[allow(dead_code)]
pub struct ScriptedStore {
    creates: Mutex<Vec<DateTime<Utc>>>,
    updates: Mutex<Vec<(RecordId, DateTime<Utc>, i64)>>,
    create_results: Mutex<VecDeque<Result<RecordId, StoreError>>>,
    update_results: Mutex<VecDeque<Result<(), StoreError>>>,
    gate: Option<Arc<Semaphore>>,
}

#[allow(dead_code)]
impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose creates block until `gate` hands out a permit.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn queue_create(&self, result: Result<RecordId, StoreError>) {
        self.create_results.lock().unwrap().push_back(result);
    }

    pub fn queue_update(&self, result: Result<(), StoreError>) {
        self.update_results.lock().unwrap().push_back(result);
    }

    pub fn creates(&self) -> Vec<DateTime<Utc>> {
        self.creates.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(RecordId, DateTime<Utc>, i64)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for ScriptedStore {
    async fn create(&self, start_time: DateTime<Utc>) -> Result<RecordId, StoreError> {
        let call = {
            let mut creates = self.creates.lock().unwrap();
            creates.push(start_time);
            creates.len()
        };

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let queued = self.create_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(RecordId::new(call.to_string())))
    }

    async fn update(
        &self,
        id: &RecordId,
        end_time: DateTime<Utc>,
        duration_ms: i64,
    ) -> Result<(), StoreError> {
        self.updates
            .lock()
            .unwrap()
            .push((id.clone(), end_time, duration_ms));
        let queued = self.update_results.lock().unwrap().pop_front();
        queued.unwrap_or(Ok(()))
    }
}

#[allow(dead_code)]
pub fn unavailable() -> StoreError {
    StoreError::Unavailable("network down".to_string())
}

#[allow(dead_code)]
pub fn at(timestamp: &str) -> DateTime<Utc> {
    timestamp.parse().expect("valid RFC 3339 timestamp")
}

/// Shared buffer the test subscriber writes formatted logs into.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

#[allow(dead_code)]
impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    /// Install a thread-local subscriber capturing every level into this buffer.
    pub fn capture(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(self.subscriber())
    }

    /// Install the capturing subscriber for every thread of the process.
    ///
    /// Only one test per binary may call this.
    pub fn capture_global(&self) {
        tracing::subscriber::set_global_default(self.subscriber())
            .expect("global subscriber already set");
    }

    /// Number of captured lines containing `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.contents().lines().filter(|l| l.contains(needle)).count()
    }

    fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let buffer = self.clone();
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || buffer.clone())
            .finish()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub fn temp_file(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let path = temp_dir.path().join(name);
    fs::write(&path, contents).expect("failed to write file");
    (temp_dir, path)
}
