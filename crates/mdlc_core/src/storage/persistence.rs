//! Snapshot persistence seam used by the stores.
//!
//! # Responsibility
//! - Define `Persist`, the sink every store calls after an applied mutation.
//! - Load one JSON document per store key with field-level default merging.
//! - Drop unreadable records inside a collection without losing the rest.

use super::{KeyValueStore, StorageResult};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Receives a full-state snapshot after every applied store mutation.
pub trait Persist<S: ?Sized> {
    fn persist(&mut self, snapshot: &S) -> StorageResult<()>;
}

impl<S: ?Sized, F> Persist<S> for F
where
    F: FnMut(&S) -> StorageResult<()>,
{
    fn persist(&mut self, snapshot: &S) -> StorageResult<()> {
        self(snapshot)
    }
}

/// Sink that discards snapshots, for pure in-memory use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersist;

impl<S: ?Sized> Persist<S> for NoopPersist {
    fn persist(&mut self, _snapshot: &S) -> StorageResult<()> {
        Ok(())
    }
}

/// One JSON document stored under a fixed key of a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct Persistence<K> {
    backend: K,
    key: String,
}

impl<K: KeyValueStore> Persistence<K> {
    pub fn new(backend: K, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the stored document, tolerating every kind of bad data.
    ///
    /// - absent key or backend read failure -> `S::default()`
    /// - invalid JSON or a non-object document -> `S::default()`
    /// - readable object with missing or malformed fields -> defaults merged
    ///   in field by field
    pub fn load<S>(&self) -> S
    where
        S: Serialize + DeserializeOwned + Default,
    {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(
                    "event=state_load module=storage status=default reason=absent key={}",
                    self.key
                );
                return S::default();
            }
            Err(err) => {
                warn!(
                    "event=state_load module=storage status=default reason=read_failed key={} error={}",
                    self.key, err
                );
                return S::default();
            }
        };
        decode_with_defaults(&self.key, &raw)
    }

    /// Serializes and writes a snapshot under this key.
    pub fn save<S: Serialize + ?Sized>(&self, snapshot: &S) -> StorageResult<()> {
        let encoded = serde_json::to_string(snapshot)?;
        self.backend.set(&self.key, &encoded)
    }
}

impl<K: KeyValueStore, S: Serialize + ?Sized> Persist<S> for Persistence<K> {
    fn persist(&mut self, snapshot: &S) -> StorageResult<()> {
        self.save(snapshot)
    }
}

fn decode_with_defaults<S>(key: &str, raw: &str) -> S
where
    S: Serialize + DeserializeOwned + Default,
{
    if let Ok(state) = serde_json::from_str::<S>(raw) {
        return state;
    }

    let stored = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(stored)) => stored,
        Ok(_) | Err(_) => {
            warn!("event=state_load module=storage status=default reason=corrupt key={key}");
            return S::default();
        }
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(S::default()) else {
        return S::default();
    };

    for (field, value) in stored {
        if !merged.contains_key(&field) {
            continue;
        }
        let previous = merged.insert(field.clone(), value);
        if serde_json::from_value::<S>(Value::Object(merged.clone())).is_err() {
            warn!(
                "event=state_load module=storage status=partial reason=bad_field key={key} field={field}"
            );
            if let Some(previous) = previous {
                merged.insert(field, previous);
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or_default()
}

/// `deserialize_with` helper for persisted record lists.
///
/// Elements that do not decode are dropped with a warning; the field itself
/// must still be an array.
pub(crate) fn skip_invalid_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    let total = raw.len();
    let entries: Vec<T> = raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(_) => {
                warn!("event=state_load module=storage status=partial reason=bad_entry index={index}");
                None
            }
        })
        .collect();
    if entries.len() < total {
        debug!(
            "event=state_load module=storage status=partial kept={} dropped={}",
            entries.len(),
            total - entries.len()
        );
    }
    Ok(entries)
}

/// `deserialize_with` helper for persisted records keyed by id.
///
/// Keys are decoded from their JSON string form (ids, names). Entries whose
/// key or value does not decode are dropped with a warning.
pub(crate) fn skip_invalid_values<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
    D: Deserializer<'de>,
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
{
    let raw = Map::<String, Value>::deserialize(deserializer)?;
    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        let decoded = serde_json::from_value::<K>(Value::String(key.clone()))
            .and_then(|id| serde_json::from_value::<V>(value).map(|record| (id, record)));
        match decoded {
            Ok((id, record)) => {
                entries.insert(id, record);
            }
            Err(_) => {
                warn!("event=state_load module=storage status=partial reason=bad_entry entry={key}");
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::{decode_with_defaults, skip_invalid_entries, skip_invalid_values};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Sample {
        names: Vec<String>,
        count: u32,
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Records {
        #[serde(deserialize_with = "skip_invalid_entries")]
        list: Vec<u32>,
        #[serde(deserialize_with = "skip_invalid_values")]
        by_key: BTreeMap<String, u32>,
    }

    #[test]
    fn invalid_json_falls_back_to_default() {
        let state: Sample = decode_with_defaults("k", "{not json");
        assert_eq!(state, Sample::default());
    }

    #[test]
    fn malformed_field_is_defaulted_and_others_kept() {
        let state: Sample = decode_with_defaults("k", r#"{"names":["a"],"count":"many"}"#);
        assert_eq!(
            state,
            Sample {
                names: vec!["a".to_string()],
                count: 0
            }
        );
    }

    #[test]
    fn bad_records_are_dropped_one_by_one() {
        let state: Records = decode_with_defaults(
            "k",
            r#"{"list":[1,"two",3],"by_key":{"a":1,"b":"x","c":3}}"#,
        );
        assert_eq!(state.list, vec![1, 3]);
        assert_eq!(state.by_key.keys().cloned().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn non_collection_field_still_falls_back() {
        let state: Records = decode_with_defaults("k", r#"{"list":7,"by_key":{"a":1}}"#);
        assert!(state.list.is_empty());
        assert_eq!(state.by_key.len(), 1);
    }

    #[test]
    fn missing_fields_are_defaulted() {
        let state: Sample = decode_with_defaults("k", r#"{"count":3}"#);
        assert_eq!(state.count, 3);
        assert!(state.names.is_empty());
    }
}
