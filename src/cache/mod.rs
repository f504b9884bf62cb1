//! Persistent `URL → payload` cache.
//!
//! [`CacheStore`] is the contract the converter depends on; [`FileCacheStore`]
//! is the bundled durable implementation and [`MemoryCacheStore`] a
//! process-local one.
//!
//! `find` reports a missing key and a storage malfunction with the same
//! [`Error::CacheRead`]. Callers that need to tell them apart call `exists`
//! first, which is what [`crate::Converter`] does.

pub mod file;

pub use file::FileCacheStore;

use crate::error::Error;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Key/value persistence keyed by URL.
///
/// Read failures are [`Error::CacheRead`], write failures
/// [`Error::CacheWrite`]. No TTL or size bound is enforced here.
pub trait CacheStore: Send + Sync {
    /// Whether `key` has a stored, non-null value.
    fn exists(&self, key: &str) -> Result<bool, Error>;

    /// The stored value. Fails with `CacheRead` when the key is absent or
    /// holds `null`.
    fn find(&self, key: &str) -> Result<Value, Error>;

    fn store(&self, key: &str, value: &Value) -> Result<(), Error>;

    /// Remove `key`. Removing an absent key is not an error.
    fn invalidate(&self, key: &str) -> Result<(), Error>;

    /// Remove every entry.
    fn clear(&self) -> Result<(), Error>;
}

/// A stored JSON `null` counts as no entry.
pub(crate) fn live(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

pub(crate) fn cache_miss(key: &str) -> Error {
    Error::CacheRead {
        message: format!("Cache miss for '{key}'"),
        source: None,
    }
}

/// In-process cache; entries live as long as the store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn exists(&self, key: &str) -> Result<bool, Error> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(live(entries.get(key)).is_some())
    }

    fn find(&self, key: &str) -> Result<Value, Error> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        live(entries.get(key)).cloned().ok_or_else(|| cache_miss(key))
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), Error> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<(), Error> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryCacheStore::new();
        assert!(!store.exists("k").unwrap());

        store.store("k", &json!("value")).unwrap();
        assert!(store.exists("k").unwrap());
        assert_eq!(store.find("k").unwrap(), json!("value"));
        assert_eq!(store.len(), 1);

        store.invalidate("k").unwrap();
        assert!(!store.exists("k").unwrap());
        store.invalidate("k").unwrap();
    }

    #[test]
    fn memory_store_miss_is_a_read_error() {
        let store = MemoryCacheStore::new();
        assert!(matches!(store.find("missing"), Err(Error::CacheRead { .. })));
    }

    #[test]
    fn memory_store_null_is_not_an_entry() {
        let store = MemoryCacheStore::new();
        store.store("k", &Value::Null).unwrap();
        assert!(!store.exists("k").unwrap());
        assert!(matches!(store.find("k"), Err(Error::CacheRead { .. })));
    }

    #[test]
    fn memory_store_clear() {
        let store = MemoryCacheStore::new();
        store.store("a", &json!(1)).unwrap();
        store.store("b", &json!(2)).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(!store.exists("a").unwrap());
    }
}
