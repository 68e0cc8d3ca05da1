//! The role store: named prompts plus an always-valid active role.

use super::codec::{self, Generation};
use super::model::Role;
use super::preset::{BUILTIN_DEFAULT_PROMPT, DEFAULT_ROLE, default_roles};
use crate::config::{ConfigStore, keys};
use crate::error::Result;

/// Owns the persona mapping and the active-role pointer.
///
/// Every mutator re-establishes the store invariants before returning:
///
/// - the [`DEFAULT_ROLE`] entry exists
/// - `active_role` names an existing entry
///
/// so reads never need to heal the store. Roles keep insertion order for
/// display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleStore {
    roles: Vec<Role>,
    active_role: String,
}

impl Default for RoleStore {
    fn default() -> Self {
        Self {
            roles: Vec::new(),
            active_role: DEFAULT_ROLE.to_string(),
        }
    }
}

impl RoleStore {
    /// Creates an empty store. Call [`load`](Self::load) or
    /// [`ensure_defaults`](Self::ensure_defaults) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the built-in personas.
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        store.ensure_defaults();
        store
    }

    /// Creates a store from persisted configuration.
    pub fn from_config(config: &dyn ConfigStore) -> Self {
        let mut store = Self::new();
        store.load(config);
        store
    }

    /// Reconstructs roles from the newest decodable encoding.
    ///
    /// Never fails: undecodable generations are skipped, and with nothing
    /// usable the built-in personas are seeded. The normalised active role is
    /// written back under both active-role keys.
    pub fn load(&mut self, config: &dyn ConfigStore) {
        self.roles.clear();

        match codec::decode_cascade(config) {
            Some(decoded) => {
                tracing::debug!(
                    generation = ?decoded.generation,
                    count = decoded.roles.len(),
                    "Loaded persisted roles"
                );
                self.roles = decoded.roles;
                if decoded.seed_builtins {
                    // Upgrading from a single prompt: add the other personas
                    // without overwriting the operator's text.
                    for role in default_roles() {
                        if !self.contains(&role.name) {
                            self.roles.push(role);
                        }
                    }
                }
                if decoded.generation != Generation::Lines {
                    tracing::info!(
                        generation = ?decoded.generation,
                        "Roles loaded from a legacy encoding; next persist migrates them"
                    );
                }
            }
            None => tracing::debug!("No persisted roles found, seeding built-in personas"),
        }

        self.active_role = config
            .get_non_blank(keys::ACTIVE_ROLE)
            .or_else(|| config.get_non_blank(keys::ACTIVE_ROLE_LEGACY))
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());

        self.ensure_defaults();

        if let Err(err) = self.write_active_role(config) {
            tracing::warn!(error = %err, "Failed to write normalised active role");
        }
    }

    /// Seeds personas on an empty mapping and repairs the invariants.
    ///
    /// Idempotent.
    pub fn ensure_defaults(&mut self) {
        if self.roles.is_empty() {
            self.roles = default_roles();
            self.active_role = DEFAULT_ROLE.to_string();
        }
        if !self.contains(DEFAULT_ROLE) {
            self.roles
                .insert(0, Role::new(DEFAULT_ROLE, BUILTIN_DEFAULT_PROMPT));
        }
        if self.active_role.trim().is_empty() || !self.contains(&self.active_role) {
            self.active_role = DEFAULT_ROLE.to_string();
        }
    }

    /// Selects the active role. Blank or unknown names select the default.
    pub fn set_active_role(&mut self, name: &str) {
        let name = name.trim();
        self.active_role = if name.is_empty() || !self.contains(name) {
            DEFAULT_ROLE.to_string()
        } else {
            name.to_string()
        };
        self.ensure_defaults();
    }

    pub fn active_role(&self) -> &str {
        &self.active_role
    }

    /// Prompt text of the active role.
    pub fn active_prompt(&self) -> &str {
        self.get_role_prompt(&self.active_role)
    }

    /// Resolves a role's prompt, never returning blank text.
    ///
    /// Blank or unknown names resolve to the default role; a blank prompt
    /// falls back to the default role's prompt, then to the built-in text.
    pub fn get_role_prompt(&self, name: &str) -> &str {
        let name = name.trim();
        let name = if name.is_empty() || !self.contains(name) {
            DEFAULT_ROLE
        } else {
            name
        };

        self.find(name)
            .filter(|role| !role.is_blank())
            .or_else(|| self.find(DEFAULT_ROLE).filter(|role| !role.is_blank()))
            .map(|role| role.prompt.as_str())
            .unwrap_or(BUILTIN_DEFAULT_PROMPT)
    }

    /// Inserts or replaces a role. A blank name targets the default role.
    pub fn set_role_prompt(&mut self, name: &str, prompt: impl Into<String>) {
        let name = match name.trim() {
            "" => DEFAULT_ROLE,
            trimmed => trimmed,
        };
        let prompt = prompt.into();
        match self.roles.iter_mut().find(|role| role.name == name) {
            Some(role) => role.prompt = prompt,
            None => self.roles.push(Role::new(name, prompt)),
        }
        self.ensure_defaults();
    }

    /// Deletes a role. The default role and blank names are ignored.
    pub fn remove_role(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || name == DEFAULT_ROLE {
            return;
        }
        self.roles.retain(|role| role.name != name);
        self.ensure_defaults();
    }

    /// Replaces the whole mapping, committing a batch of staged edits.
    pub fn replace_roles(&mut self, roles: Vec<Role>) {
        self.roles.clear();
        for role in roles {
            if role.name.trim().is_empty() {
                continue;
            }
            let Role { name, prompt } = role;
            self.set_role_prompt(&name, prompt);
        }
        self.ensure_defaults();
    }

    /// Restores the four built-in personas and activates the default.
    pub fn reset_to_defaults(&mut self) {
        self.roles = default_roles();
        self.active_role = DEFAULT_ROLE.to_string();
    }

    /// Writes roles in the current encoding and clears older generations.
    pub fn persist(&self, config: &dyn ConfigStore) -> Result<()> {
        config.set(keys::ROLES_ENCODED, &codec::encode_lines(&self.roles))?;
        config.clear(keys::ROLES_JSON)?;
        config.clear(keys::LEGACY_SYSTEM_PROMPT)?;
        self.write_active_role(config)?;
        tracing::debug!(count = self.roles.len(), active = %self.active_role, "Persisted roles");
        Ok(())
    }

    fn write_active_role(&self, config: &dyn ConfigStore) -> Result<()> {
        config.set(keys::ACTIVE_ROLE, &self.active_role)?;
        config.set(keys::ACTIVE_ROLE_LEGACY, &self.active_role)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(|role| role.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|role| role.name == name)
    }
}
