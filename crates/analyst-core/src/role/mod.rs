//! Role (persona) domain module.
//!
//! A role is a named system prompt that steers the analytical stance of the
//! model. This module owns the built-in personas, the persisted encodings and
//! the [`RoleStore`] that keeps the active-role pointer valid.
//!
//! # Module Structure
//!
//! - `model`: the [`Role`] value type
//! - `preset`: built-in personas and the default role name
//! - `codec`: the three generations of persisted role encodings
//! - `store`: [`RoleStore`], the in-memory mapping plus load/persist

pub mod codec;
mod model;
mod preset;
mod store;

pub use model::Role;
pub use preset::{
    API_ROLE, BUILTIN_DEFAULT_PROMPT, DEFAULT_ROLE, RED_TEAM_ROLE, SKEPTIC_ROLE, builtin_prompt,
    default_roles,
};
pub use store::RoleStore;
