//! Persistent JSON store (component D).
//!
//! A `BTreeMap<String, serde_json::Value>` persisted as pretty-printed,
//! sorted-key JSON. Load is best-effort: an absent or malformed file is
//! treated as an empty store rather than an error, since the file on
//! disk is always a cache, never the source of truth for anything a
//! rebuild can't reconstruct. Save only happens when the store was
//! actually mutated, and always goes through a temp-file-plus-rename so
//! a reader never observes a half-written file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Error, Result};

/// A dictionary persisted as sorted-key JSON, with dirty-tracked saves.
#[derive(Debug)]
pub struct PersistentJsonStore {
    path: PathBuf,
    data: BTreeMap<String, Value>,
    dirty: bool,
}

impl PersistentJsonStore {
    /// Open (or create, in memory) the store at `path`.
    ///
    /// A missing file yields an empty store. A present but malformed file
    /// also yields an empty store: this mirrors the cache's policy that a
    /// corrupt side file is never a fatal error, only a cold cache.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();

        Self {
            path,
            data,
            dirty: false,
        }
    }

    /// Read a key's value, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a key's value, marking the store dirty if it actually changed.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if self.data.get(&key) != Some(&value) {
            self.data.insert(key, value);
            self.dirty = true;
        }
    }

    /// Whether the store has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist to disk if dirty, atomically. No-op otherwise.
    pub fn save_if_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.save()
    }

    /// Persist to disk unconditionally, atomically.
    pub fn save(&mut self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.data)?;
        write_atomic(&self.path, text.as_bytes())?;
        self.dirty = false;
        Ok(())
    }
}

/// Write `bytes` to `path` atomically: write to a `.tmp` sibling, then rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(&tmp, bytes).map_err(|source| Error::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
#[path = "jsonstore_tests.rs"]
mod tests;
