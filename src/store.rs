//! Durable key-value profile store
//!
//! The node persists small text blobs (wake profiles, the durable token)
//! under a namespace/key pair. The file-backed implementation keeps one file
//! per key; tests use the in-memory store.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Durable key -> blob persistence, survives restart
pub trait ProfileStore: Send + Sync {
    /// Read a value, `None` when the key was never written
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()>;
}

/// File-backed store: `<root>/<namespace>/<key>`
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(key)
    }
}

impl ProfileStore for FileStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let path = self.path_for(namespace, key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(namespace, key);
        let dir = path.parent().expect("store path has no parent");
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        // write-then-rename so a crash never leaves a torn blob
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path).with_context(|| format!("renaming to {}", path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<std::collections::HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().expect("store lock poisoned");
        Ok(entries.get(&(namespace.into(), key.into())).cloned())
    }

    fn put(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.insert((namespace.into(), key.into()), value.into());
        Ok(())
    }
}

/// A store that rejects every write, for exercising failure paths in tests
#[cfg(test)]
pub struct BrokenStore;

#[cfg(test)]
impl ProfileStore for BrokenStore {
    fn get(&self, _namespace: &str, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn put(&self, _namespace: &str, _key: &str, _value: &str) -> Result<()> {
        anyhow::bail!("store unavailable")
    }
}
