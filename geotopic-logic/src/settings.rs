use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::bucket::BucketKey;

/// Whether the user has asked for location updates, survives restarts so tracking can resume
pub const KEY_REQUESTING_LOCATION_UPDATES: &str = "requesting_location_updates";
/// The bucket we're currently subscribed to
pub const KEY_PREV_GEO_HASH: &str = "previous_geo_hash";

/// Small, synchronous key-value store that persists across restarts.
pub trait SettingsStore: Send + Sync + 'static {
    fn get_string(&self, key: &str) -> Option<String>;
    fn put_string(&self, key: &str, value: &str);
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn put_bool(&self, key: &str, value: bool);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    String(String),
}

/// [SettingsStore] that lives in memory, other stores can wrap this and persist [Self::snapshot]
#[derive(Debug, Default)]
pub struct MemoryStore(Mutex<HashMap<String, SettingValue>>);

impl MemoryStore {
    pub fn new(values: HashMap<String, SettingValue>) -> Self {
        Self(Mutex::new(values))
    }

    pub fn snapshot(&self) -> HashMap<String, SettingValue> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn get(&self, key: &str) -> Option<SettingValue> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: &str, value: SettingValue) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }
}

impl SettingsStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(SettingValue::String(s)) => Some(s),
            _ => None,
        }
    }

    fn put_string(&self, key: &str, value: &str) {
        self.put(key, SettingValue::String(value.to_string()));
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(SettingValue::Bool(b)) => Some(b),
            _ => None,
        }
    }

    fn put_bool(&self, key: &str, value: bool) {
        self.put(key, SettingValue::Bool(value));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Which bucket this device is currently subscribed to, [None] if it never subscribed
pub struct SubscriptionState {
    pub current_bucket: Option<BucketKey>,
}

impl SubscriptionState {
    pub fn load(store: &impl SettingsStore) -> Self {
        let current_bucket = store
            .get_string(KEY_PREV_GEO_HASH)
            .and_then(BucketKey::from_persisted);
        Self { current_bucket }
    }

    pub fn save(&self, store: &impl SettingsStore) {
        let raw = self.current_bucket.as_ref().map_or("", BucketKey::as_str);
        store.put_string(KEY_PREV_GEO_HASH, raw);
    }
}
