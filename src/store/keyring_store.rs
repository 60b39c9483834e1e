use super::{KeyValueStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

const KEYRING_SERVICE: &str = "io.camsports.client";
pub const KEYRING_USER_SESSION: &str = "session";

type Group = BTreeMap<String, String>;

/// OS keychain backend. The whole key group lives in a single keychain
/// entry as a JSON object, so a group write is one keychain write.
pub struct KeyringStore {
    user: &'static str,
    cached: Mutex<Option<Group>>,
}

fn keyring_err(e: keyring::Error) -> StoreError {
    StoreError::Keyring(e.to_string())
}

impl KeyringStore {
    pub fn new(user: &'static str) -> Self {
        Self {
            user,
            cached: Mutex::new(None),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(KEYRING_SERVICE, self.user)
    }

    pub fn is_available(&self) -> bool {
        let Ok(entry) = self.entry() else {
            return false;
        };

        match entry.get_password() {
            Ok(_) => true,
            Err(keyring::Error::NoEntry) => true,
            Err(keyring::Error::BadEncoding(_)) => true,
            Err(keyring::Error::Ambiguous(_)) => true,
            Err(keyring::Error::NoStorageAccess(_)) => false,
            Err(keyring::Error::PlatformFailure(_)) => false,
            Err(_) => false,
        }
    }

    fn read_entry(&self) -> Result<Group, StoreError> {
        let entry = self.entry().map_err(keyring_err)?;
        match entry.get_password() {
            Ok(raw) if raw.trim().is_empty() => Ok(Group::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(keyring::Error::NoEntry) => Ok(Group::new()),
            Err(e) => Err(keyring_err(e)),
        }
    }

    fn write_entry(&self, group: &Group) -> Result<(), StoreError> {
        let entry = self.entry().map_err(keyring_err)?;
        if group.is_empty() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(keyring_err(e)),
            }
        } else {
            let raw = serde_json::to_string(group)?;
            entry.set_password(&raw).map_err(keyring_err)
        }
    }

    fn load(&self) -> Result<Group, StoreError> {
        let mut guard = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(group) = guard.as_ref() {
            return Ok(group.clone());
        }
        let group = self.read_entry()?;
        *guard = Some(group.clone());
        Ok(group)
    }

    /// Read, modify and write under one lock so concurrent group writes
    /// cannot lose each other. `apply` returns false when nothing changed.
    fn update(&self, apply: impl FnOnce(&mut Group) -> bool) -> Result<(), StoreError> {
        let mut guard = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        let mut group = match guard.as_ref() {
            Some(group) => group.clone(),
            None => self.read_entry()?,
        };
        if !apply(&mut group) {
            *guard = Some(group);
            return Ok(());
        }
        self.write_entry(&group)?;
        *guard = Some(group);
        Ok(())
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        let group = self.load()?;
        Ok(keys.iter().map(|k| group.get(*k).cloned()).collect())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        self.update(|group| {
            for (key, value) in entries {
                group.insert((*key).to_string(), (*value).to_string());
            }
            true
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|group| {
            let before = group.len();
            for key in keys {
                group.remove(*key);
            }
            group.len() != before || before == 0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn concurrent_group_writes_are_not_lost() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        let store = Arc::new(KeyringStore::new("concurrent-writes"));
        store.set_many(&[("access_token", "a1")]).unwrap();

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let key = format!("key{i}");
                    store.set_many(&[(key.as_str(), "v")]).unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let keys: Vec<String> = (0..8).map(|i| format!("key{i}")).collect();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        let values = store.get_many(&keys).unwrap();
        assert!(values.iter().all(|v| v.as_deref() == Some("v")));
        assert_eq!(store.get("access_token").unwrap().as_deref(), Some("a1"));

        store.remove_many(&["access_token"]).unwrap();
        assert_eq!(store.get("access_token").unwrap(), None);
        assert_eq!(store.get("key0").unwrap().as_deref(), Some("v"));
    }
}
