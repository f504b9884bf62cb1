//! Single-file transactional cache store.
//!
//! The whole cache is one JSON object (`{"<url>": <payload>, ...}`). Every
//! operation runs inside a transaction on that file:
//!
//! * read transactions load a snapshot and never write;
//! * write transactions load, mutate, and commit by writing a sibling temp
//!   file and renaming it over the original, so an interrupted commit
//!   leaves either the old file or the new one, never a torn write.
//!   A transaction that changes nothing does not touch the disk.
//!
//! Transactions on one store are serialised by an in-process lock. Nothing
//! coordinates separate stores or processes sharing a path beyond the
//! atomicity of the rename: concurrent writers race and the last commit wins.

use super::{cache_miss, live, CacheStore};
use crate::error::{Cause, Error};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Default location of the cache file, relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = "tmp/url2md-cache.json";

type Table = BTreeMap<String, Value>;

/// Storage-layer failures, mapped onto `CacheRead`/`CacheWrite` by the
/// [`CacheStore`] impl.
#[derive(Debug, thiserror::Error)]
enum StoreError {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("'{path}' is not a valid cache file: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode cache table: {0}")]
    Encode(serde_json::Error),
}

impl StoreError {
    fn into_read_error(self) -> Error {
        Error::CacheRead {
            message: self.to_string(),
            source: Some(Arc::new(self) as Cause),
        }
    }

    fn into_write_error(self) -> Error {
        Error::CacheWrite {
            message: self.to_string(),
            source: Some(Arc::new(self) as Cause),
        }
    }
}

/// File-backed [`CacheStore`]. The path is fixed at construction.
#[derive(Debug)]
pub struct FileCacheStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Default for FileCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH)
    }
}

impl FileCacheStore {
    /// Open a store at `path`. The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_transaction<T>(&self, f: impl FnOnce(&Table) -> T) -> Result<T, StoreError> {
        let _guard = self.guard();
        let table = self.load()?;
        Ok(f(&table))
    }

    fn write_transaction<T>(&self, f: impl FnOnce(&mut Table) -> T) -> Result<T, StoreError> {
        let _guard = self.guard();
        let mut table = self.load()?;
        let before = table.clone();
        let out = f(&mut table);
        if table != before {
            self.commit(&table)?;
        }
        Ok(out)
    }

    fn load(&self) -> Result<Table, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Table::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Table::new()),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn commit(&self, table: &Table) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;

        let encoded = serde_json::to_vec(table).map_err(StoreError::Encode)?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&encoded).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        sync_dir(dir).map_err(write_err)?;

        debug!("Committed {} cache entries to {}", table.len(), self.path.display());
        Ok(())
    }
}

/// Flush the directory entry so the rename itself survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl CacheStore for FileCacheStore {
    fn exists(&self, key: &str) -> Result<bool, Error> {
        self.read_transaction(|table| live(table.get(key)).is_some())
            .map_err(StoreError::into_read_error)
    }

    fn find(&self, key: &str) -> Result<Value, Error> {
        self.read_transaction(|table| live(table.get(key)).cloned())
            .map_err(StoreError::into_read_error)?
            .ok_or_else(|| cache_miss(key))
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), Error> {
        self.write_transaction(|table| {
            table.insert(key.to_string(), value.clone());
        })
        .map_err(StoreError::into_write_error)
    }

    fn invalidate(&self, key: &str) -> Result<(), Error> {
        self.write_transaction(|table| {
            table.remove(key);
        })
        .map_err(StoreError::into_write_error)
    }

    fn clear(&self) -> Result<(), Error> {
        let _guard = self.guard();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write {
                path: self.path.clone(),
                source,
            }
            .into_write_error()),
        }
    }
}
