//! Test doubles shared by the unit tests in this crate.

use crate::config::ConfigStore;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// A `ConfigStore` over a plain map.
#[derive(Default)]
pub(crate) struct MapStore(Mutex<HashMap<String, String>>);

impl MapStore {
    pub(crate) fn with(entries: &[(&str, &str)]) -> Self {
        let store = Self::default();
        for (key, value) in entries {
            store.set(key, value).unwrap();
        }
        store
    }
}

impl ConfigStore for MapStore {
    fn get(&self, key: &str) -> Option<String> {
        self.0.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.0.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.0.lock().unwrap().remove(key);
        Ok(())
    }
}
