//! Durable key-value backends.
//!
//! Values are JSON. Legacy saves stored numbers, booleans and records as
//! strings, so the typed helpers accept both the native and the stringly
//! form on read and always write the native form.

use crate::errors::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;
    fn set(&mut self, key: &str, value: Value) -> StoreResult<()>;
    fn remove(&mut self, key: &str) -> StoreResult<()>;
    /// Every key currently stored.
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Integer lookup, `default` when absent or unparseable.
    fn get_int(&self, key: &str, default: i64) -> StoreResult<i64> {
        Ok(self.get(key)?.and_then(|v| int_value(&v)).unwrap_or(default))
    }

    /// Boolean lookup, `default` when absent or unparseable.
    fn get_bool(&self, key: &str, default: bool) -> StoreResult<bool> {
        Ok(self.get(key)?.and_then(|v| bool_value(&v)).unwrap_or(default))
    }

    fn get_record<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>>
    where
        Self: Sized,
    {
        let Some(value) = self.get(key)? else {
            return Ok(None);
        };
        let value = unwrap_stringly(value);
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                key: key.to_string(),
                details: err.to_string(),
            })
    }

    fn set_record<T: Serialize>(&mut self, key: &str, record: &T) -> StoreResult<()>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(record)?;
        self.set(key, value)
    }
}

/// Accepts `12`, `12.7` and `"12"` like the legacy `parseInt` reader did.
fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            let digits: String = s
                .char_indices()
                .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
                .map(|(_, c)| c)
                .collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn bool_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Records written as JSON text inside a string are parsed once more.
fn unwrap_stringly(value: Value) -> Value {
    match value {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

/// In-process store. Used by tests and by hosts that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.values.remove(key);
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.values.keys().cloned().collect())
    }
}

/// One JSON object on disk. Every call re-reads the file so another process
/// sharing it is seen immediately; writes go through a temp file and a
/// rename so a crash never leaves a torn save.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> StoreResult<Map<String, Value>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Corrupt {
                key: self.path.display().to_string(),
                details: format!("expected a JSON object, found {}", kind_name(&other)),
            }),
        }
    }

    fn write_all(&self, map: Map<String, Value>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let text = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&tmp, text)?;
        if let Err(err) = fs::rename(&tmp, &self.path) {
            warn!(path = %self.path.display(), error = %err, "save rename failed");
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        debug!(path = %self.path.display(), "save written");
        Ok(())
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
        let mut map = self.read_all()?;
        map.insert(key.to_string(), value);
        self.write_all(map)
    }

    fn remove(&mut self, key: &str) -> StoreResult<()> {
        let mut map = self.read_all()?;
        if map.remove(key).is_some() {
            self.write_all(map)?;
        }
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.read_all()?.keys().cloned().collect())
    }
}
