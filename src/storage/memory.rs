//! In-memory event store.
//!
//! Thread-safe reference implementation of `EventStore` for embedded usage
//! and tests. Retention is enforced lazily on read plus an explicit
//! `purge_expired` sweep.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::storage::traits::EventStore;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Clone)]
struct StoredRecord {
    payload: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory `EventStore` backed by a `RwLock`ed map.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    records: RwLock<HashMap<String, StoredRecord>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, including not-yet-purged expired ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.records.read().map_err(|_| lock_err("records"))?.len())
    }

    /// True if the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    /// Keys with the given prefix, in unspecified order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the lock is poisoned.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("records"))?;
        let now = Utc::now();
        Ok(records
            .iter()
            .filter(|(key, record)| key.starts_with(prefix) && !record.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Drops all expired records, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BackendError` if the lock is poisoned.
    pub fn purge_expired(&self) -> Result<usize, StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("records"))?;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }
}

impl EventStore for InMemoryEventStore {
    fn save(
        &self,
        key: &str,
        payload: &[u8],
        retention: Option<Duration>,
    ) -> Result<(), StorageError> {
        let expires_at = match retention {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl).map_err(|e| {
                    StorageError::BackendError(format!("retention out of range: {e}"))
                })?;
                Some(Utc::now() + ttl)
            }
            None => None,
        };

        let mut records = self.records.write().map_err(|_| lock_err("records"))?;
        records.insert(
            key.to_string(),
            StoredRecord {
                payload: payload.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("records"))?;
        match records.get(key) {
            Some(record) if !record.is_expired(Utc::now()) => Ok(Some(record.payload.clone())),
            _ => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("records"))?;
        if records.remove(key).is_none() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip() {
        let store = InMemoryEventStore::new();
        store.save("events/a", b"payload", None).unwrap();

        assert_eq!(store.load("events/a").unwrap(), Some(b"payload".to_vec()));
        assert_eq!(store.load("events/missing").unwrap(), None);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn save_overwrites_existing_key() {
        let store = InMemoryEventStore::new();
        store.save("k", b"one", None).unwrap();
        store.save("k", b"two", None).unwrap();

        assert_eq!(store.load("k").unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn expired_records_are_invisible_and_purgeable() {
        let store = InMemoryEventStore::new();
        store
            .save("short", b"x", Some(Duration::from_nanos(1)))
            .unwrap();
        store.save("long", b"y", Some(Duration::from_secs(3600))).unwrap();

        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(store.load("short").unwrap(), None);
        assert_eq!(store.load("long").unwrap(), Some(b"y".to_vec()));

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn delete_unknown_key_errors() {
        let store = InMemoryEventStore::new();
        let err = store.delete("nope").unwrap_err();
        assert!(matches!(err, StorageError::KeyNotFound(_)));

        store.save("yes", b"v", None).unwrap();
        store.delete("yes").unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn keys_with_prefix_filters() {
        let store = InMemoryEventStore::new();
        store.save("events/expense.created/1", b"a", None).unwrap();
        store.save("events/expense.created/2", b"b", None).unwrap();
        store.save("events/user.logged_in/3", b"c", None).unwrap();

        let mut keys = store.keys_with_prefix("events/expense.created/").unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "events/expense.created/1".to_string(),
                "events/expense.created/2".to_string()
            ]
        );
    }
}
