//! Host page abstraction for script injection.
//!
//! The timer injects the embed loader once per mount and removes it on
//! teardown. [`HostPage`] is that seam; [`ScriptRegistry`] is the page the
//! relay server exposes, serving whatever loader is currently mounted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::{Result, SessionTimingError};

use super::script::EmbedScript;

/// Handle to an injected script element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptHandle(u64);

impl ScriptHandle {
    /// Numeric handle value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A page the embed loader can be injected into.
pub trait HostPage: Send + Sync {
    /// Append the loader script to the page.
    fn inject_script(&self, script: &EmbedScript) -> Result<ScriptHandle>;

    /// Remove a previously injected script.
    fn remove_script(&self, handle: ScriptHandle) -> Result<()>;
}

/// Page that keeps injected scripts in memory.
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    scripts: Mutex<BTreeMap<ScriptHandle, String>>,
    next_handle: AtomicU64,
}

impl ScriptRegistry {
    /// Create an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Source of the most recently injected script still on the page.
    pub fn current_script(&self) -> Option<String> {
        self.scripts
            .lock()
            .ok()
            .and_then(|scripts| scripts.values().next_back().cloned())
    }

    /// Number of scripts currently on the page.
    pub fn script_count(&self) -> usize {
        self.scripts.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl HostPage for ScriptRegistry {
    fn inject_script(&self, script: &EmbedScript) -> Result<ScriptHandle> {
        let handle = ScriptHandle(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        let mut scripts = self
            .scripts
            .lock()
            .map_err(|_| SessionTimingError::Embed("script registry lock poisoned".to_string()))?;
        scripts.insert(handle, script.render());
        Ok(handle)
    }

    fn remove_script(&self, handle: ScriptHandle) -> Result<()> {
        let mut scripts = self
            .scripts
            .lock()
            .map_err(|_| SessionTimingError::Embed("script registry lock poisoned".to_string()))?;
        scripts.remove(&handle).ok_or_else(|| {
            SessionTimingError::Embed(format!("script {} is not on the page", handle.0))
        })?;
        Ok(())
    }
}
