use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use geotopic_logic::{MemoryStore, SettingValue, SettingsStore};
use log::error;

use crate::prelude::*;

/// [SettingsStore] persisted as a JSON object, every write goes straight to disk
pub struct JsonFileStore {
    path: PathBuf,
    values: MemoryStore,
    // Held from the in-memory update through the rename so an older snapshot can't land last
    save_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, a missing file is an empty store
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str::<HashMap<String, SettingValue>>(&raw)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            values: MemoryStore::new(values),
            save_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }
        let encoded = serde_json::to_vec_pretty(&self.values.snapshot())
            .context("Failed to encode settings")?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, encoded).context("Failed to write settings")?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace settings file")?;
        Ok(())
    }

    fn persist_with(&self, update: impl FnOnce(&MemoryStore)) {
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        update(&self.values);
        if let Err(why) = self.save() {
            error!(
                "Failed to persist settings to {}: {why:?}",
                self.path.display()
            );
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get_string(key)
    }

    fn put_string(&self, key: &str, value: &str) {
        self.persist_with(|values| values.put_string(key, value));
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get_bool(key)
    }

    fn put_bool(&self, key: &str, value: bool) {
        self.persist_with(|values| values.put_bool(key, value));
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use geotopic_logic::{KEY_PREV_GEO_HASH, KEY_REQUESTING_LOCATION_UPDATES};

    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get_string(KEY_PREV_GEO_HASH), None);
        assert_eq!(store.get_bool(KEY_REQUESTING_LOCATION_UPDATES), None);
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.put_string(KEY_PREV_GEO_HASH, "wydm");
        store.put_bool(KEY_REQUESTING_LOCATION_UPDATES, true);
        drop(store);

        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get_string(KEY_PREV_GEO_HASH).as_deref(), Some("wydm"));
        assert_eq!(store.get_bool(KEY_REQUESTING_LOCATION_UPDATES), Some(true));

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json[KEY_PREV_GEO_HASH], "wydm");
        assert_eq!(json[KEY_REQUESTING_LOCATION_UPDATES], true);
    }

    #[test]
    fn test_creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.put_bool(KEY_REQUESTING_LOCATION_UPDATES, false);
        assert!(path.exists());
    }

    #[test]
    fn test_corrupt_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(JsonFileStore::open(&path).is_err());
    }

    #[test]
    fn test_concurrent_puts_all_persisted() {
        const THREADS: usize = 8;
        const PUTS: usize = 50;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = Arc::new(JsonFileStore::open(&path).unwrap());

        let handles = (0..THREADS)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..PUTS {
                        store.put_string(&format!("key-{t}-{i}"), "value");
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }
        drop(store);

        let store = JsonFileStore::open(&path).unwrap();
        let missing = (0..THREADS)
            .flat_map(|t| (0..PUTS).map(move |i| format!("key-{t}-{i}")))
            .filter(|key| store.get_string(key).is_none())
            .count();
        assert_eq!(missing, 0, "{missing} keys lost after reopen");
    }
}
