// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key-value cache used to persist device state across restarts.
//!
//! Devices store their universe under [`universe_key`] and every scene under
//! [`scene_key`]; values are strings produced by [`crate::codec`].
//!
//! Two backends are provided: [`MemoryCache`] for tests and ephemeral runs,
//! and [`FileCache`], a write-through JSON file.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::error::CacheError;

/// String key-value store shared by all devices.
pub trait Cache: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// Cache key of a device's universe.
#[must_use]
pub fn universe_key(device_alias: &str) -> String {
    format!("{device_alias}_universe")
}

/// Cache key of one scene of a device.
#[must_use]
pub fn scene_key(device_alias: &str, scene_alias: &str) -> String {
    format!("{device_alias}_scene_{scene_alias}")
}

/// In-memory cache.
///
/// # Examples
///
/// ```
/// use dmx_executor::cache::{Cache, MemoryCache};
///
/// let cache = MemoryCache::new();
/// cache.set("stage_universe", "000511000").unwrap();
/// assert_eq!(cache.get("stage_universe").unwrap().as_deref(), Some("000511000"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Write-through cache persisted as a JSON object on disk.
///
/// The whole file is rewritten on every `set` through a temporary file and a
/// rename, so a crash never leaves a truncated cache behind.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileCache {
    /// Opens the cache file, creating an empty cache if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CacheError` if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened file cache");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|v| v == value) {
            return Ok(());
        }
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }
}
