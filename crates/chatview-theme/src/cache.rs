//! Key/value resource cache shared by all sessions of a theme.
//!
//! Entries are written by the theme script during loading (`toCache`,
//! `saveFilesToCache`) and read back through `srvUtil.cache` and
//! `srvUtil.loadFromCacheMulti`. Last writer wins; nothing expires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine as _;
use serde_json::Value;

/// A cached resource: raw file bytes or a script-provided value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Bytes(Vec<u8>),
    Json(Value),
}

impl CacheValue {
    /// Representation handed back to script.
    ///
    /// UTF-8 bytes become a string, other bytes a base64 string.
    pub fn to_script_value(&self) -> Value {
        match self {
            CacheValue::Json(v) => v.clone(),
            CacheValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => Value::String(base64::engine::general_purpose::STANDARD.encode(bytes)),
            },
        }
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(bytes: Vec<u8>) -> Self {
        CacheValue::Bytes(bytes)
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        CacheValue::Json(value)
    }
}

/// Cheaply cloneable handle to a theme's cache.
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    entries: Arc<Mutex<HashMap<String, CacheValue>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, value: impl Into<CacheValue>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<CacheValue> {
        self.lock().get(key).cloned()
    }

    /// Entries for every key present; missing keys are omitted.
    pub fn get_many<'a, I>(&self, keys: I) -> HashMap<String, CacheValue>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = self.lock();
        keys.into_iter()
            .filter_map(|k| entries.get(k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheValue>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
