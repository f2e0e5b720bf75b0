//! Durable storage for one plugin's [`CacheEntry`].

use super::atomic::{atomic_read_json, atomic_write_json, remove_if_exists};
use super::entry::CacheEntry;
use crate::{LaunchkitError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Single-writer store of the last fetched list.
///
/// `read` distinguishes "nothing stored" (`Ok(None)`) from an unreadable
/// entry ([`LaunchkitError::CacheCorruption`]); callers treat the latter as
/// absent.
pub trait CacheStore: Send + Sync {
    fn read(&self) -> Result<Option<CacheEntry>>;
    fn write(&self, entry: &CacheEntry) -> Result<()>;
    /// Remove any stored entry. Clearing an empty store is a no-op.
    fn clear(&self) -> Result<()>;
}

/// One JSON file per plugin instance.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for JsonFileStore {
    fn read(&self) -> Result<Option<CacheEntry>> {
        match atomic_read_json::<CacheEntry>(&self.path) {
            Ok(entry) => {
                if entry.is_none() {
                    debug!("No cache file at {}", self.path.display());
                }
                Ok(entry)
            }
            Err(LaunchkitError::Json { message, .. }) => {
                warn!("Cache file {} is corrupt: {}", self.path.display(), message);
                Err(LaunchkitError::CacheCorruption {
                    path: self.path.clone(),
                    message,
                })
            }
            Err(e) => Err(e),
        }
    }

    fn write(&self, entry: &CacheEntry) -> Result<()> {
        atomic_write_json(&self.path, entry)?;
        debug!(
            "Wrote {} cached items to {}",
            entry.items.len(),
            self.path.display()
        );
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        remove_if_exists(&self.path)
    }
}

/// Store that never touches the filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entry: Mutex<Option<CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn read(&self) -> Result<Option<CacheEntry>> {
        Ok(self
            .entry
            .lock()
            .map_err(|_| LaunchkitError::Other("Memory store lock poisoned".into()))?
            .clone())
    }

    fn write(&self, entry: &CacheEntry) -> Result<()> {
        *self
            .entry
            .lock()
            .map_err(|_| LaunchkitError::Other("Memory store lock poisoned".into()))? =
            Some(entry.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entry
            .lock()
            .map_err(|_| LaunchkitError::Other("Memory store lock poisoned".into()))?
            .take();
        Ok(())
    }
}
