//! Schema-free remote records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One element of a remote list (an artist, a bookmark, a document...).
///
/// The core never interprets fields itself; per-service adapters read them
/// through [`ItemSchema`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteItem(Map<String, Value>);

impl RemoteItem {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value; anything other than an object is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follow a dotted path through nested objects, e.g. `statistics.albumCount`.
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// String field, treating JSON null and empty strings as absent.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.pointer(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn i64_field(&self, key: &str) -> Option<i64> {
        self.pointer(key).and_then(Value::as_i64)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.pointer(key).and_then(Value::as_bool)
    }

    /// Array of strings; non-string elements are skipped.
    pub fn str_list(&self, key: &str) -> Vec<&str> {
        self.pointer(key)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for RemoteItem {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Per-service projection of a [`RemoteItem`].
pub trait ItemSchema: Send + Sync {
    /// Stable key assigned by the remote service.
    fn identity(&self, item: &RemoteItem) -> Option<String> {
        item.get("id").and_then(|id| match id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
    }

    /// Text the query filter matches against.
    fn searchable_text(&self, item: &RemoteItem) -> String;
}

/// Schema that searches a single string field.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    field: &'static str,
}

impl FieldSchema {
    pub const fn new(field: &'static str) -> Self {
        Self { field }
    }
}

impl ItemSchema for FieldSchema {
    fn searchable_text(&self, item: &RemoteItem) -> String {
        item.str_field(self.field).unwrap_or_default().to_string()
    }
}
