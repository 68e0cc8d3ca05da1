use analyst_core::{ConfigStore, Result};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard, PoisonError};

/// Process-local configuration store.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let values = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }

    /// Owned copy of every entry, sorted by key.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.values.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.values.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_clear() {
        let store = InMemoryConfigStore::new();
        assert_eq!(store.get("a"), None);
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));
        store.clear("a").unwrap();
        store.clear("a").unwrap();
        assert_eq!(store.get("a"), None);
    }

    #[test]
    fn test_get_non_blank() {
        let store = InMemoryConfigStore::with_entries([("blank", "  "), ("x", "y")]);
        assert_eq!(store.get_non_blank("blank"), None);
        assert_eq!(store.get_non_blank("x").as_deref(), Some("y"));
    }
}
