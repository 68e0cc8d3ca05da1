//! Role domain model.

use serde::{Deserialize, Serialize};

/// A named persona prompt.
///
/// Names are unique within a [`RoleStore`](super::RoleStore), non-empty and
/// stored trimmed. The prompt may be blank; lookups fall back to the default
/// role in that case.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub prompt: String,
}

impl Role {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            prompt: prompt.into(),
        }
    }

    /// Returns true when the prompt carries no usable text.
    pub fn is_blank(&self) -> bool {
        self.prompt.trim().is_empty()
    }
}
