use analyst_infrastructure::TomlConfigStore;
use anyhow::{Context, Result};
use std::path::Path;

/// Opens the config file given on the command line, or the default one.
pub fn open_store(path: Option<&Path>) -> Result<TomlConfigStore> {
    let store = match path {
        Some(path) => TomlConfigStore::open(path),
        None => TomlConfigStore::open_default(),
    };
    store.context("Failed to open analyst config")
}
