//! Key-value persistence for workspace stores.
//!
//! # Responsibility
//! - Define the synchronous key-value backend contract (`KeyValueStore`).
//! - Provide in-memory and SQLite-file backends.
//! - Load/save one JSON document per store through `Persistence`.
//!
//! # Invariants
//! - Writes are synchronous; a returned `Ok(())` means the value is stored.
//! - Loads never fail: absent or corrupt documents fall back to defaults.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

mod memory;
pub mod migrations;
mod persistence;
mod sqlite;

pub use memory::MemoryKeyValueStore;
pub(crate) use persistence::{skip_invalid_entries, skip_invalid_values};
pub use persistence::{NoopPersist, Persist, Persistence};
pub use sqlite::SqliteKeyValueStore;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure to read or write persisted state.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying SQLite error.
    Sqlite(rusqlite::Error),
    /// Database was written by a newer schema than this binary knows.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Backend refused the write because its capacity is exhausted.
    QuotaExceeded {
        key: String,
        required: usize,
        available: usize,
    },
    /// Snapshot could not be encoded as JSON.
    Serialize(serde_json::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "storage schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::QuotaExceeded {
                key,
                required,
                available,
            } => write!(
                f,
                "storage quota exceeded writing `{key}`: need {required} bytes, {available} available"
            ),
            Self::Serialize(err) => write!(f, "failed to encode snapshot: {err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } | Self::QuotaExceeded { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialize(value)
    }
}

/// Synchronous string key-value backend.
///
/// Methods take `&self` so one backend can be shared by several stores.
pub trait KeyValueStore {
    /// Reads the value under `key`, `None` when absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    /// Writes `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    /// Deletes `key`; deleting an absent key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}
