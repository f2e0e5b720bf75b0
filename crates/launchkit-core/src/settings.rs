//! Runtime plugin settings.
//!
//! Each plugin reads its settings through a [`Settings`] handle, which falls
//! back to documented defaults when a value is missing, empty or of the wrong
//! type. Values are persisted by a [`ConfigStore`].

use crate::cache::atomic::{atomic_read_json, atomic_write_json};
use crate::{LaunchkitError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Key/value persistence for plugin settings.
pub trait ConfigStore: Send + Sync {
    fn read(&self, plugin: &str, key: &str) -> Result<Option<Value>>;
    fn write(&self, plugin: &str, key: &str, value: Value) -> Result<()>;
}

/// One JSON object per plugin under a config directory.
#[derive(Debug)]
pub struct JsonConfigStore {
    dir: PathBuf,
    loaded: Mutex<HashMap<String, Map<String, Value>>>,
}

impl JsonConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, plugin: &str) -> PathBuf {
        self.dir.join(format!("{}.json", plugin))
    }

    fn with_plugin<T>(
        &self,
        plugin: &str,
        f: impl FnOnce(&mut Map<String, Value>) -> Result<T>,
    ) -> Result<T> {
        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if !loaded.contains_key(plugin) {
            let path = self.path_for(plugin);
            let values = match atomic_read_json::<Map<String, Value>>(&path) {
                Ok(values) => values.unwrap_or_default(),
                Err(e) => {
                    warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                    Map::new()
                }
            };
            loaded.insert(plugin.to_string(), values);
        }
        let values = loaded
            .get_mut(plugin)
            .ok_or_else(|| LaunchkitError::Other("settings vanished".into()))?;
        f(values)
    }
}

impl ConfigStore for JsonConfigStore {
    fn read(&self, plugin: &str, key: &str) -> Result<Option<Value>> {
        self.with_plugin(plugin, |values| Ok(values.get(key).cloned()))
    }

    fn write(&self, plugin: &str, key: &str, value: Value) -> Result<()> {
        let path = self.path_for(plugin);
        self.with_plugin(plugin, |values| {
            values.insert(key.to_string(), value);
            atomic_write_json(&path, &*values)
        })
    }
}

/// Settings held in memory only.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<HashMap<(String, String), Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn read(&self, plugin: &str, key: &str) -> Result<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(&(plugin.to_string(), key.to_string())).cloned())
    }

    fn write(&self, plugin: &str, key: &str, value: Value) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((plugin.to_string(), key.to_string()), value);
        Ok(())
    }
}

/// Typed view of one plugin's settings.
#[derive(Clone)]
pub struct Settings {
    plugin: String,
    store: Arc<dyn ConfigStore>,
}

impl Settings {
    pub fn new(plugin: impl Into<String>, store: Arc<dyn ConfigStore>) -> Self {
        Self {
            plugin: plugin.into(),
            store,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn raw(&self, key: &str) -> Option<Value> {
        match self.store.read(&self.plugin, key) {
            Ok(value) => value.filter(|v| !v.is_null()),
            Err(e) => {
                warn!("Failed to read {}.{}: {}", self.plugin, key, e);
                None
            }
        }
    }

    /// String setting; missing or empty values yield `default`.
    pub fn string(&self, key: &str, default: &str) -> String {
        match self.raw(key) {
            Some(Value::String(s)) if !s.is_empty() => s,
            Some(Value::String(_)) | None => default.to_string(),
            Some(other) => self.wrong_type(key, &other, default.to_string()),
        }
    }

    pub fn int(&self, key: &str, default: i64) -> i64 {
        match self.raw(key) {
            Some(Value::Number(n)) => match n.as_i64() {
                Some(n) => n,
                None => self.wrong_type(key, &Value::Number(n), default),
            },
            // Some hosts persist numbers as strings.
            Some(Value::String(s)) => match s.trim().parse() {
                Ok(n) => n,
                Err(_) => self.wrong_type(key, &Value::String(s), default),
            },
            None => default,
            Some(other) => self.wrong_type(key, &other, default),
        }
    }

    /// Boolean setting. A stored `false` is honoured.
    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.raw(key) {
            Some(Value::Bool(b)) => b,
            None => default,
            Some(other) => self.wrong_type(key, &other, default),
        }
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.store.write(&self.plugin, key, value)
    }

    fn wrong_type<T>(&self, key: &str, value: &Value, default: T) -> T {
        warn!(
            "Setting {}.{} has unexpected value {}, using default",
            self.plugin, key, value
        );
        default
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}
