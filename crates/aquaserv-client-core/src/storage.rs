//! Where the session is persisted between runs. Values are opaque strings
//! stored under the keys in [`aquaserv_shared::const_config::storage`]

use anyhow::Context as _;
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

pub trait SessionStorage: Debug + Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// Keeps values in memory only. Clones share the same values which makes it
/// possible to hand the same storage to a new [`crate::Client`] to simulate a
/// reload
#[derive(Clone, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

/// Stores all values in a single JSON file
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted list of the keys currently stored
    pub fn keys(&self) -> Vec<String> {
        let mut result: Vec<String> = self
            .values
            .lock()
            .expect("mutex poisoned")
            .keys()
            .cloned()
            .collect();
        result.sort();
        result
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().expect("mutex poisoned").is_empty()
    }
}

impl Debug for MemoryStorage {
    // WARNING: Values are not printed as they include the access token
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("keys", &self.keys())
            .finish()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.lock().expect("mutex poisoned").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values
            .lock()
            .expect("mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.values.lock().expect("mutex poisoned").remove(key);
        Ok(())
    }
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is treated as empty
    fn read_all(&self) -> anyhow::Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file: {:?}", self.path))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .with_context(|| format!("session file is not valid: {:?}", self.path))
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create folder: {parent:?}"))?;
            }
        }
        let contents =
            serde_json::to_string_pretty(values).context("failed to serialize session values")?;
        std::fs::write(&self.path, contents)
            .with_context(|| format!("failed to write session file: {:?}", self.path))
    }

    fn modify<F>(&self, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().expect("mutex poisoned");
        let mut values = self.read_all()?;
        f(&mut values);
        self.write_all(&values)
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let _guard = self.lock.lock().expect("mutex poisoned");
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.modify(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.modify(|values| {
            values.remove(key);
        })
    }
}
