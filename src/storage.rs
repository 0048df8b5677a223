// src/storage.rs
//! Durable key-value storage for role-scoped credentials.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::app_log;
use crate::role::Role;

/// Last authenticated role, independent of the in-memory role context.
pub const USER_ROLE_KEY: &str = "user_role";

/// Refresh token key used when no role is stored.
pub const GENERIC_REFRESH_KEY: &str = "refresh";

pub fn access_token_key(role: Role) -> String {
    format!("{}_access_token", role.as_str())
}

pub fn refresh_token_key(role: Role) -> String {
    format!("{}_refresh_token", role.as_str())
}

/// Synchronous single-key store. Writes overwrite, removes of missing keys
/// are no-ops.
pub trait TokenStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Stored active role; values that are not a known role read as absent.
pub fn stored_role(store: &dyn TokenStore) -> Option<Role> {
    store.get(USER_ROLE_KEY).and_then(|value| value.parse().ok())
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file, rewritten on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries: BTreeMap<String, String> = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read token store: {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)
                    .with_context(|| format!("Failed to parse token store: {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };

        app_log!(trace, "Opened token store {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create directory: {}", parent.display())
                })?;
            }
        }

        let content =
            serde_json::to_string_pretty(entries).context("Failed to serialize token store")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write token store: {}", self.path.display()))
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = entries.clone();
        updated.insert(key.to_string(), value.to_string());
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut updated = entries.clone();
        updated.remove(key);
        self.persist(&updated)?;
        *entries = updated;
        Ok(())
    }
}
