//! File-backed configuration store.
//!
//! Persists a flat TOML table of string keys. Every write is a locked
//! read-modify-write cycle so two processes sharing the file never lose each
//! other's keys.
//!
//! Provides:
//! - **Atomicity**: updates go through a tmp file and an atomic rename
//! - **Isolation**: an exclusive `fs2` lock serialises writers
//! - **Durability**: explicit fsync before rename

use crate::paths::AnalystPaths;
use analyst_core::{AnalystError, ConfigStore, Result};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Table = BTreeMap<String, String>;

pub struct TomlConfigStore {
    path: PathBuf,
    cache: Mutex<Table>,
}

impl TomlConfigStore {
    /// Opens the store at `path`.
    ///
    /// A missing or empty file is an empty store. A file that is not a flat
    /// table of strings is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = load_table(&path)?;
        tracing::debug!(path = %path.display(), keys = table.len(), "Opened config store");
        Ok(Self {
            path,
            cache: Mutex::new(table),
        })
    }

    /// Opens the store at the platform default location.
    pub fn open_default() -> Result<Self> {
        Self::open(AnalystPaths::config_file()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owned copy of every entry, sorted by key.
    pub fn snapshot(&self) -> Table {
        self.cache().clone()
    }

    /// Re-reads the file, picking up changes made by other processes.
    pub fn reload(&self) -> Result<()> {
        let table = load_table(&self.path)?;
        *self.cache() = table;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Table),
    {
        let mut cache = self.cache();
        let _lock = FileLock::acquire(&self.path)?;

        let mut table = load_table(&self.path)?;
        f(&mut table);
        save_table(&self.path, &table)?;

        *cache = table;
        Ok(())
    }

    fn cache(&self) -> MutexGuard<'_, Table> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|table| {
            table.insert(key.to_string(), value.to_string());
        })
    }

    fn clear(&self, key: &str) -> Result<()> {
        if !self.cache().contains_key(key) {
            return Ok(());
        }
        self.update(|table| {
            table.remove(key);
        })
    }
}

fn load_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Ok(Table::new());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Table::new());
    }

    Ok(toml::from_str(&content)?)
}

fn save_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(table)?;

    let tmp_path = temp_path(path)?;
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(content.as_bytes())?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let parent = path
        .parent()
        .ok_or_else(|| AnalystError::storage("Path has no parent directory"))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| AnalystError::storage("Path has no file name"))?;
    Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
}

/// Exclusive lock on a sibling `.lock` file, released on drop.
struct FileLock {
    _file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        use fs2::FileExt;
        file.lock_exclusive()
            .map_err(|e| AnalystError::storage(format!("Failed to acquire lock: {}", e)))?;

        Ok(Self {
            _file: file,
            lock_path,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlock happens when the handle closes; removing the file is best effort.
        let _ = fs::remove_file(&self.lock_path);
    }
}
