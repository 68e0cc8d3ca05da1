//! Configuration store abstraction and backend settings.
//!
//! The analyst never owns its persistence. It reads and writes plain strings
//! through a [`ConfigStore`] supplied by the host, which may be an options file,
//! an embedded key/value table, or memory.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Logical configuration keys.
pub mod keys {
    /// Base URL (or full endpoint) of the generate-style backend.
    pub const BACKEND_URL: &str = "analyst.backend.url";
    /// Model name sent with every generate request.
    pub const BACKEND_MODEL: &str = "analyst.backend.model";
    /// Legacy single system prompt from before roles existed.
    pub const LEGACY_SYSTEM_PROMPT: &str = "analyst.backend.prompt";
    /// Current role encoding: one `base64(name)=base64(prompt)` per line.
    pub const ROLES_ENCODED: &str = "analyst.roles.encoded";
    /// Legacy role encoding: a flat JSON object of name to prompt.
    pub const ROLES_JSON: &str = "analyst.roles.json";
    /// Active role name.
    pub const ACTIVE_ROLE: &str = "analyst.activeRole";
    /// Active role name as written by older builds. Kept in sync.
    pub const ACTIVE_ROLE_LEGACY: &str = "analyst.roles.active";
}

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:11434/";
pub const DEFAULT_MODEL: &str = "llama3:70b";

/// A string-keyed get/set/clear store.
///
/// Implementations must be safe to share between threads; the orchestrator
/// reads from worker tasks while the operator edits settings.
pub trait ConfigStore: Send + Sync {
    /// Returns the stored value, or `None` if the key is absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a key. Removing an absent key is not an error.
    fn clear(&self, key: &str) -> Result<()>;

    /// Returns the value when present and not blank.
    fn get_non_blank(&self, key: &str) -> Option<String> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }
}

/// Connection settings for the direct HTTP backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub url: String,
    pub model: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl BackendSettings {
    /// Reads settings from the store, falling back to defaults per key.
    pub fn load(store: &dyn ConfigStore) -> Self {
        let defaults = Self::default();
        Self {
            url: store.get_non_blank(keys::BACKEND_URL).unwrap_or(defaults.url),
            model: store
                .get_non_blank(keys::BACKEND_MODEL)
                .unwrap_or(defaults.model),
        }
    }

    pub fn persist(&self, store: &dyn ConfigStore) -> Result<()> {
        store.set(keys::BACKEND_URL, self.url.trim())?;
        store.set(keys::BACKEND_MODEL, self.model.trim())?;
        Ok(())
    }

    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MapStore;

    #[test]
    fn test_load_defaults_when_empty() {
        let store = MapStore::default();
        assert_eq!(BackendSettings::load(&store), BackendSettings::default());
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let store = MapStore::default();
        store.set(keys::BACKEND_URL, "   ").unwrap();
        store.set(keys::BACKEND_MODEL, "mistral").unwrap();

        let settings = BackendSettings::load(&store);
        assert_eq!(settings.url, DEFAULT_BACKEND_URL);
        assert_eq!(settings.model, "mistral");
    }

    #[test]
    fn test_persist_round_trip() {
        let store = MapStore::default();
        let settings = BackendSettings {
            url: "http://127.0.0.1:8080/api/generate".to_string(),
            model: "qwen2".to_string(),
        };
        settings.persist(&store).unwrap();
        assert_eq!(BackendSettings::load(&store), settings);
    }
}
