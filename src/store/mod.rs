//! Persisted key-value storage for the session key group.
//!
//! Every backend applies `set_many`/`remove_many` as a unit: a reader never
//! observes half of a group write.

mod file_store;
mod keyring_store;

pub use file_store::FileStore;
pub use keyring_store::{KeyringStore, KEYRING_USER_SESSION};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store contents are not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("OS keychain/secret service is unavailable: {0}")]
    Keyring(String),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Reads several keys from one consistent view of the store.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError>;

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        (**self).get_many(keys)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        (**self).set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        (**self).remove_many(keys)
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        let guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.iter().map(|k| guard.get(*k).cloned()).collect())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            guard.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_group_write_and_remove() {
        let store = MemoryStore::new();
        store
            .set_many(&[("access_token", "a1"), ("refresh_token", "r1")])
            .unwrap();
        assert_eq!(
            store.get_many(&["access_token", "refresh_token", "userInfo"]).unwrap(),
            vec![Some("a1".to_string()), Some("r1".to_string()), None]
        );

        store.remove_many(&["access_token", "refresh_token"]).unwrap();
        assert!(store.is_empty());
        store.remove_many(&["access_token"]).unwrap();
    }
}
