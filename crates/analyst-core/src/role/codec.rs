//! Persisted role encodings.
//!
//! Three generations exist on disk, newest first:
//!
//! 1. **Lines** (current): one `base64(name)=base64(prompt)` pair per line,
//!    stored under [`keys::ROLES_ENCODED`].
//! 2. **JSON** (legacy): a flat object `{"name": "prompt", ...}` stored under
//!    [`keys::ROLES_JSON`].
//! 3. **Single prompt** (legacy): one system prompt under
//!    [`keys::LEGACY_SYSTEM_PROMPT`], installed as the default role.
//!
//! Decoders are tried in order and the first one that yields a non-empty
//! mapping wins. A decode failure counts as absent data.

use super::model::Role;
use super::preset::DEFAULT_ROLE;
use crate::config::{ConfigStore, keys};
use crate::error::{AnalystError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

/// Which on-disk generation produced a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    Lines,
    Json,
    LegacyPrompt,
}

/// Output of a successful decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub generation: Generation,
    pub roles: Vec<Role>,
    /// Set when the remaining built-in personas must be added after loading.
    pub seed_builtins: bool,
}

/// A decoder reads one generation from the store.
pub type Decoder = fn(&dyn ConfigStore) -> Option<Decoded>;

/// All decoders, newest generation first.
pub const DECODERS: [Decoder; 3] = [read_lines, read_json, read_legacy_prompt];

/// Runs the cascade and returns the first generation that decodes.
pub fn decode_cascade(store: &dyn ConfigStore) -> Option<Decoded> {
    DECODERS.iter().find_map(|decoder| decoder(store))
}

// ============================================================================
// Generation 1: base64 lines
// ============================================================================

/// Encodes roles in the current line-oriented format.
pub fn encode_lines(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|role| {
            format!(
                "{}={}",
                BASE64_STANDARD.encode(role.name.as_bytes()),
                BASE64_STANDARD.encode(role.prompt.as_bytes())
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decodes the line-oriented format. Blank lines are ignored; any malformed
/// line fails the whole document.
pub fn decode_lines(text: &str) -> Result<Vec<Role>> {
    let mut roles = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let (encoded_name, encoded_prompt) = split_encoded_line(line).ok_or_else(|| {
            AnalystError::decode("base64-lines", format!("line {} has no separator", index + 1))
        })?;
        let name = String::from_utf8(BASE64_STANDARD.decode(encoded_name)?)?;
        let prompt = String::from_utf8(BASE64_STANDARD.decode(encoded_prompt)?)?;
        if name.trim().is_empty() {
            return Err(AnalystError::decode(
                "base64-lines",
                format!("line {} has an empty role name", index + 1),
            ));
        }
        upsert(&mut roles, Role::new(name, prompt));
    }
    Ok(roles)
}

/// Splits `name=prompt` where both halves are padded base64.
///
/// The name's own padding may contain `=`, so the separator is the first `=`
/// sitting on a 4-character boundary.
fn split_encoded_line(line: &str) -> Option<(&str, &str)> {
    line.match_indices('=')
        .map(|(index, _)| index)
        .find(|index| *index > 0 && index % 4 == 0)
        .map(|index| (&line[..index], &line[index + 1..]))
}

fn read_lines(store: &dyn ConfigStore) -> Option<Decoded> {
    let text = store.get_non_blank(keys::ROLES_ENCODED)?;
    accept(Generation::Lines, decode_lines(&text))
}

// ============================================================================
// Generation 2: JSON object
// ============================================================================

/// Decodes a flat JSON object of string values, preserving key order.
pub fn decode_json_object(text: &str) -> Result<Vec<Role>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let object = value
        .as_object()
        .ok_or_else(|| AnalystError::decode("JSON", "top-level value is not an object"))?;

    let mut roles = Vec::with_capacity(object.len());
    for (name, prompt) in object {
        let prompt = prompt.as_str().ok_or_else(|| {
            AnalystError::decode("JSON", format!("value for '{}' is not a string", name))
        })?;
        if name.trim().is_empty() {
            return Err(AnalystError::decode("JSON", "empty role name"));
        }
        upsert(&mut roles, Role::new(name.as_str(), prompt));
    }
    Ok(roles)
}

fn read_json(store: &dyn ConfigStore) -> Option<Decoded> {
    let text = store.get_non_blank(keys::ROLES_JSON)?;
    accept(Generation::Json, decode_json_object(&text))
}

// ============================================================================
// Generation 3: single legacy prompt
// ============================================================================

fn read_legacy_prompt(store: &dyn ConfigStore) -> Option<Decoded> {
    let prompt = store.get_non_blank(keys::LEGACY_SYSTEM_PROMPT)?;
    Some(Decoded {
        generation: Generation::LegacyPrompt,
        roles: vec![Role::new(DEFAULT_ROLE, prompt)],
        seed_builtins: true,
    })
}

fn accept(generation: Generation, result: Result<Vec<Role>>) -> Option<Decoded> {
    match result {
        Ok(roles) if !roles.is_empty() => Some(Decoded {
            generation,
            roles,
            seed_builtins: false,
        }),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(?generation, error = %err, "Ignoring undecodable role encoding");
            None
        }
    }
}

fn upsert(roles: &mut Vec<Role>, role: Role) {
    match roles.iter_mut().find(|existing| existing.name == role.name) {
        Some(existing) => existing.prompt = role.prompt,
        None => roles.push(role),
    }
}
