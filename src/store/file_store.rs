use super::{KeyValueStore, StoreError};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// JSON-object file holding string values. Writes go to a temp file in the
/// same directory that is renamed over the target, so the file on disk
/// always holds a complete group.
#[derive(Debug)]
pub struct FileStore {
  path: PathBuf,
  values: Mutex<JsonMap<String, JsonValue>>,
}

fn read_values(path: &Path) -> Result<JsonMap<String, JsonValue>, StoreError> {
  let data = match std::fs::read_to_string(path) {
    Ok(d) => d,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(JsonMap::new()),
    Err(e) => return Err(e.into()),
  };
  if data.trim().is_empty() {
    return Ok(JsonMap::new());
  }
  match serde_json::from_str::<JsonValue>(&data)? {
    JsonValue::Object(map) => Ok(map),
    _ => Ok(JsonMap::new()),
  }
}

impl FileStore {
  pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let path = path.into();
    let values = read_values(&path)?;
    Ok(Self {
      path,
      values: Mutex::new(values),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn persist(&self, values: &JsonMap<String, JsonValue>) -> Result<(), StoreError> {
    let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      Some(parent) => {
        std::fs::create_dir_all(parent)?;
        parent
      }
      None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, values)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
  }

  fn update(
    &self,
    apply: impl FnOnce(&mut JsonMap<String, JsonValue>),
  ) -> Result<(), StoreError> {
    let mut guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    let mut next = guard.clone();
    apply(&mut next);
    if next == *guard {
      return Ok(());
    }
    self.persist(&next)?;
    *guard = next;
    Ok(())
  }
}

fn as_string(value: Option<&JsonValue>) -> Option<String> {
  value?.as_str().map(|s| s.to_string())
}

impl KeyValueStore for FileStore {
  fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
    let guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(as_string(guard.get(key)))
  }

  fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
    let guard = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(keys.iter().map(|k| as_string(guard.get(*k))).collect())
  }

  fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
    self.update(|map| {
      for (key, value) in entries {
        map.insert((*key).to_string(), JsonValue::String((*value).to_string()));
      }
    })
  }

  fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
    self.update(|map| {
      for key in keys {
        map.remove(*key);
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn scratch_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
  }

  #[test]
  fn file_store_round_trips_group_across_reopen() {
    let dir = scratch_dir();
    let path = dir.path().join("session.json");
    let store = FileStore::open(&path).unwrap();
    store
      .set_many(&[("access_token", "a1"), ("refresh_token", "r1"), ("userInfo", "{}")])
      .unwrap();

    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.get("access_token").unwrap().as_deref(), Some("a1"));
    assert_eq!(reopened.get("refresh_token").unwrap().as_deref(), Some("r1"));

    reopened.remove_many(&["access_token", "refresh_token", "userInfo"]).unwrap();
    let emptied = FileStore::open(&path).unwrap();
    assert_eq!(emptied.get("access_token").unwrap(), None);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|entry| entry.unwrap().file_name())
      .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("session.json")]);
  }

  #[test]
  fn file_store_creates_missing_parent_directories() {
    let dir = scratch_dir();
    let path = dir.path().join("nested").join("session.json");
    let store = FileStore::open(&path).unwrap();
    store.set_many(&[("access_token", "a1")]).unwrap();
    assert!(path.exists());
  }

  #[test]
  fn file_store_treats_missing_file_as_empty() {
    let dir = scratch_dir();
    let store = FileStore::open(dir.path().join("absent.json")).unwrap();
    assert_eq!(store.get("refresh_token").unwrap(), None);
    store.remove_many(&["refresh_token"]).unwrap();
    assert!(!store.path().exists());
  }

  #[test]
  fn file_store_rejects_corrupt_file() {
    let dir = scratch_dir();
    let path = dir.path().join("corrupt.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(matches!(FileStore::open(&path), Err(StoreError::Json(_))));
  }
}
