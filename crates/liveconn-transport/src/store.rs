//! Area → user identity persistence

use crate::TransportError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Remembers which user id was handed out for each area
pub trait IdentityStore: Send + Sync {
    /// User id stored for `area`
    fn get(&self, area: &str) -> Option<String>;

    /// Store `user` as the identity for `area`
    fn set(&self, area: &str, user: &str) -> Result<(), TransportError>;
}

/// Identity store living only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryStore {
    fn get(&self, area: &str) -> Option<String> {
        lock(&self.entries).get(area).cloned()
    }

    fn set(&self, area: &str, user: &str) -> Result<(), TransportError> {
        lock(&self.entries).insert(area.to_string(), user.to_string());
        Ok(())
    }
}

/// Identity store persisted as a JSON object in one file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };

        debug!("Opened identity store {} with {} entries", path.display(), entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// File backing this store
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), TransportError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }
}

impl IdentityStore for JsonFileStore {
    fn get(&self, area: &str) -> Option<String> {
        lock(&self.entries).get(area).cloned()
    }

    fn set(&self, area: &str, user: &str) -> Result<(), TransportError> {
        let mut entries = lock(&self.entries);
        let mut updated = entries.clone();
        updated.insert(area.to_string(), user.to_string());

        // Memory only changes once the file does
        self.persist(&updated)
            .map_err(|e| TransportError::Store(format!("{}: {}", self.path.display(), e)))?;
        *entries = updated;
        Ok(())
    }
}

fn lock(entries: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
