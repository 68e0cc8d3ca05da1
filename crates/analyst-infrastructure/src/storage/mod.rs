//! `ConfigStore` implementations.

mod memory_store;
mod toml_store;

pub use memory_store::InMemoryConfigStore;
pub use toml_store::TomlConfigStore;
