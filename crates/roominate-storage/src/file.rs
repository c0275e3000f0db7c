//! Plaintext JSON file storage backend.

use crate::{SecureStorage, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key/value storage persisted as a single JSON object on disk.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename, so a batch written with [`SecureStorage::set_many`] or
/// [`SecureStorage::delete_many`] lands on disk entirely or not at all.
pub struct JsonFileStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStorage {
    /// Open the file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "Opened preferences file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` to a copy of the entries, persist it, then publish it.
    /// The in-memory view only changes once the file has been replaced.
    fn commit<F, T>(&self, mutate: F) -> StorageResult<T>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> T,
    {
        let mut guard = self.entries.lock();
        let mut next = guard.clone();
        let outcome = mutate(&mut next);
        if next != *guard {
            write_atomically(&self.path, &next)?;
            *guard = next;
        }
        Ok(outcome)
    }
}

fn write_atomically(path: &Path, entries: &BTreeMap<String, String>) -> StorageResult<()> {
    let content =
        serde_json::to_vec_pretty(entries).map_err(|e| StorageError::Encoding(e.to_string()))?;

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    std::fs::write(&tmp_path, content)?;
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(err.into());
    }
    Ok(())
}

impl SecureStorage for JsonFileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.commit(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.commit(|entries| entries.remove(key).is_some())
    }

    fn set_many(&self, batch: &[(&str, &str)]) -> StorageResult<()> {
        self.commit(|entries| {
            for (key, value) in batch {
                entries.insert(key.to_string(), value.to_string());
            }
        })
    }

    fn delete_many(&self, keys: &[&str]) -> StorageResult<()> {
        self.commit(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }

    fn replace_many(&self, set: &[(&str, &str)], delete: &[&str]) -> StorageResult<()> {
        self.commit(|entries| {
            for key in delete {
                entries.remove(*key);
            }
            for (key, value) in set {
                entries.insert(key.to_string(), value.to_string());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage.set("access_token", "tok").unwrap();
        storage.set("token_type", "bearer").unwrap();
        drop(storage);

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("access_token").unwrap(), Some("tok".to_string()));
        assert_eq!(reopened.get("token_type").unwrap(), Some("bearer".to_string()));
    }

    #[test]
    fn test_file_storage_batch_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage
            .set_many(&[("a", "1"), ("b", "2"), ("keep", "3")])
            .unwrap();
        storage.delete_many(&["a", "b"]).unwrap();

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert!(!reopened.has("a").unwrap());
        assert!(!reopened.has("b").unwrap());
        assert_eq!(reopened.get("keep").unwrap(), Some("3".to_string()));
    }

    #[test]
    fn test_file_storage_replace_many_is_one_commit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage
            .set_many(&[("access_token", "old"), ("refresh_token", "old-ref")])
            .unwrap();
        storage
            .replace_many(&[("access_token", "new")], &["refresh_token"])
            .unwrap();

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("access_token").unwrap(), Some("new".to_string()));
        assert!(!reopened.has("refresh_token").unwrap());
    }

    #[test]
    fn test_file_storage_failed_write_changes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage
            .set_many(&[("access_token", "old"), ("refresh_token", "old-ref")])
            .unwrap();

        // A directory squatting on the temp name makes the write fail.
        std::fs::create_dir(dir.path().join("prefs.json.tmp")).unwrap();
        let result = storage.replace_many(&[("access_token", "new")], &["refresh_token"]);
        assert!(matches!(result, Err(StorageError::Io(_))));

        assert_eq!(storage.get("access_token").unwrap(), Some("old".to_string()));
        assert_eq!(storage.get("refresh_token").unwrap(), Some("old-ref".to_string()));

        let reopened = JsonFileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("access_token").unwrap(), Some("old".to_string()));
        assert_eq!(reopened.get("refresh_token").unwrap(), Some("old-ref".to_string()));
    }

    #[test]
    fn test_file_storage_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let storage = JsonFileStorage::open(&path).unwrap();
        storage.set("k", "v").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["prefs.json".to_string()]);
    }

    #[test]
    fn test_file_storage_delete_missing_key() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path().join("prefs.json")).unwrap();

        assert!(!storage.delete("missing").unwrap());
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json").unwrap();

        let result = JsonFileStorage::open(&path);
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
    }
}
