#![forbid(unsafe_code)]

//! Durable key/value persistence for view state.
//!
//! The engine only needs a string store with `get/set/remove`. Everything on
//! top of it is typed through [`StateRegistry`], which serializes values as
//! JSON and degrades every read failure to "absent".
//!
//! # Backends
//!
//! - [`MemoryStorage`]: process-local map, used in tests and ephemeral hosts.
//! - [`FileStorage`]: one JSON object file, rewritten through a temporary
//!   file and renamed into place on every write.
//!
//! # Failure Modes
//!
//! - A missing, unreadable, or corrupt stored value loads as `None` and logs a
//!   warning on `tabula.persist`; it is never surfaced as an error.
//! - A corrupt [`FileStorage`] file opens as an empty store; the next write
//!   replaces it.
//! - Write failures are returned to the caller as [`StorageError`]. A failed
//!   [`FileStorage`] write leaves both the file and the in-memory map as they
//!   were.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A durable string store.
pub trait StorageBackend {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Read a value; `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&mut self, key: &str, value: String) -> StorageResult<()>;

    /// Remove a value. Removing an absent key succeeds.
    fn remove(&mut self, key: &str) -> StorageResult<()>;
}

impl<S: StorageBackend + ?Sized> StorageBackend for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

/// In-memory backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// JSON-file backend.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Open (or lazily create) the store at `path`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = read_entries(&path);
        Self { path, entries }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `entries` to disk, then adopt them as the current map.
    fn commit(&mut self, entries: BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        self.entries = entries;
        Ok(())
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            tracing::warn!(
                target: "tabula.persist",
                path = %path.display(),
                error = %err,
                "state file unreadable, starting empty"
            );
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|err| {
        tracing::warn!(
            target: "tabula.persist",
            path = %path.display(),
            error = %err,
            "state file corrupt, starting empty"
        );
        BTreeMap::new()
    })
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> StorageResult<()> {
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), value);
        self.commit(entries)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut entries = self.entries.clone();
        entries.remove(key);
        self.commit(entries)
    }
}

/// Identifies one persisted state entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// Kind of state, e.g. `view`, `routines`, `wizard`.
    pub namespace: String,
    /// Instance within the namespace, e.g. a page id.
    pub instance_id: String,
}

impl StateKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, instance_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            instance_id: instance_id.into(),
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.instance_id)
    }
}

/// State that can be saved to and restored from a [`StateRegistry`].
pub trait Stateful {
    type State: Serialize + DeserializeOwned;

    fn state_key(&self) -> StateKey;

    fn save_state(&self) -> Self::State;

    fn restore_state(&mut self, state: Self::State);
}

/// Typed load/save/clear over a [`StorageBackend`].
#[derive(Debug)]
pub struct StateRegistry<S> {
    backend: S,
    prefix: Option<String>,
}

impl<S: StorageBackend> StateRegistry<S> {
    #[must_use]
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            prefix: None,
        }
    }

    /// Prefix every storage key, so several apps can share one store.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// The raw storage key for `key`.
    #[must_use]
    pub fn storage_key(&self, key: &StateKey) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}::{key}"),
            None => key.to_string(),
        }
    }

    /// Load a value; `None` when absent, unreadable, or corrupt.
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, key: &StateKey) -> Option<T> {
        let storage_key = self.storage_key(key);
        let raw = match self.backend.get(&storage_key) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(
                    target: "tabula.persist",
                    key = %storage_key,
                    backend = self.backend.name(),
                    error = %err,
                    "state read failed, using defaults"
                );
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    target: "tabula.persist",
                    key = %storage_key,
                    backend = self.backend.name(),
                    error = %err,
                    "stored state corrupt, treating as absent"
                );
                None
            }
        }
    }

    pub fn save<T: Serialize>(&mut self, key: &StateKey, value: &T) -> StorageResult<()> {
        let storage_key = self.storage_key(key);
        let json = serde_json::to_string(value)?;
        tracing::trace!(
            target: "tabula.persist",
            key = %storage_key,
            bytes = json.len(),
            "state saved"
        );
        self.backend.set(&storage_key, json)
    }

    pub fn clear(&mut self, key: &StateKey) -> StorageResult<()> {
        let storage_key = self.storage_key(key);
        self.backend.remove(&storage_key)
    }

    /// Restore `target` from storage. Returns whether a state was found.
    pub fn restore<W: Stateful>(&self, target: &mut W) -> bool {
        match self.load::<W::State>(&target.state_key()) {
            Some(state) => {
                target.restore_state(state);
                true
            }
            None => false,
        }
    }

    pub fn persist<W: Stateful>(&mut self, source: &W) -> StorageResult<()> {
        self.save(&source.state_key(), &source.save_state())
    }

    pub fn forget<W: Stateful>(&mut self, source: &W) -> StorageResult<()> {
        self.clear(&source.state_key())
    }

    #[must_use]
    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    #[must_use]
    pub fn into_backend(self) -> S {
        self.backend
    }
}
