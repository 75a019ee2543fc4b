//! Key-value persistence behind the cart.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O failed for '{path}': {source}")]
    Io {
        /// Backing file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The backing file is not valid JSON, or a value failed to (de)serialize.
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The stored data does not have the expected layout.
    #[error("unexpected store layout: {0}")]
    Shape(String),
}

/// Minimal list-valued key-value store.
pub trait KeyValueStore {
    /// Returns the list under `key`, or an empty list when absent.
    fn get(&self, key: &str) -> Result<Vec<Value>, StoreError>;
    /// Replaces the list under `key`.
    fn set(&mut self, key: &str, values: Vec<Value>) -> Result<(), StoreError>;
    /// Deletes `key`. Missing keys are not an error.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// In-process store, mostly for tests and one-shot runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<Value>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<Value>, StoreError> {
        Ok(self.entries.get(key).cloned().unwrap_or_default())
    }

    fn set(&mut self, key: &str, values: Vec<Value>) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), values);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object mapping keys to arrays.
///
/// The file is created on first write; every call re-reads it.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Opens (lazily) the store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&raw)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Shape(format!(
                "{} holds {} instead of an object",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    fn persist(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, body).map_err(io_err)?;
        debug!(path = %self.path.display(), keys = map.len(), "store written");
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Vec<Value>, StoreError> {
        match self.load()?.remove(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(values)) => Ok(values),
            Some(other) => Err(StoreError::Shape(format!(
                "key '{key}' holds {} instead of an array",
                json_kind(&other)
            ))),
        }
    }

    fn set(&mut self, key: &str, values: Vec<Value>) -> Result<(), StoreError> {
        let mut map = self.load()?;
        map.insert(key.to_string(), Value::Array(values));
        self.persist(&map)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let mut map = self.load()?;
        if map.remove(key).is_some() {
            self.persist(&map)?;
        }
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn memory_store_round_trips_lists() {
        let mut store = MemoryStore::new();
        assert!(store.get("cartItems").expect("get").is_empty());
        store.set("cartItems", vec![json!({"id": 1})]).expect("set");
        assert_eq!(store.get("cartItems").expect("get"), vec![json!({"id": 1})]);
        store.remove("cartItems").expect("remove");
        store.remove("cartItems").expect("remove twice");
        assert!(store.get("cartItems").expect("get").is_empty());
    }

    #[test]
    fn file_store_creates_file_on_first_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("store.json");
        let mut store = JsonFileStore::new(&path);

        assert!(store.get("cartItems").expect("missing file").is_empty());
        assert!(!path.exists());

        store.set("cartItems", vec![json!("a"), json!("b")]).expect("set");
        store.set("other", vec![]).expect("set other");
        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.get("cartItems").expect("get"), vec![json!("a"), json!("b")]);

        store.remove("cartItems").expect("remove");
        let on_disk: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(on_disk, json!({"other": []}));
    }

    #[test]
    fn file_store_rejects_unexpected_layouts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        fs::write(&path, "[1, 2]").expect("write");
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get("cartItems"), Err(StoreError::Shape(_))));

        fs::write(&path, r#"{"cartItems": "nope"}"#).expect("write");
        assert!(matches!(store.get("cartItems"), Err(StoreError::Shape(_))));

        fs::write(&path, "{not json").expect("write");
        assert!(matches!(store.get("cartItems"), Err(StoreError::Json(_))));
    }
}
