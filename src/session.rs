//! Session storage
//!
//! This module provides a trait-based key/value storage abstraction for the
//! client session (token, refresh token, user profile and signing key) and a
//! typed [`Session`] handle over it. The transport client reads the session on
//! every request; the login flow and the 401/403 handler are the only writers.

use crate::types::{storage_keys, SessionState, UserProfile};
use crate::{ClientError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for persisting session values under fixed string keys
///
/// Values carry no expiry; they live until overwritten or cleared.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a single value
    async fn remove(&self, key: &str) -> Result<()>;

    /// Remove every value
    async fn clear(&self) -> Result<()>;
}

/// In-memory storage implementation
///
/// Data is lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage instance
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().await;
        values.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut values = self.values.write().await;
        values.clear();
        Ok(())
    }
}

/// File-backed storage implementation
///
/// Keeps a JSON object on disk and rewrites it on every mutation, so the
/// session survives restarts of the CLI.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    values: Arc<RwLock<Map<String, Value>>>,
}

impl FileStorage {
    /// Open (or start) a storage file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => map,
                _ => {
                    return Err(ClientError::storage(format!(
                        "{} does not contain a JSON object",
                        path.display()
                    )))
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: Arc::new(RwLock::new(values)),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, values: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let contents = serde_json::to_string_pretty(values)?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().await;
        Ok(values
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), Value::String(value.to_string()));
        self.persist(&values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().await;
        if values.remove(key).is_some() {
            self.persist(&values).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut values = self.values.write().await;
        values.clear();
        self.persist(&values).await
    }
}

/// Typed handle over the session keys
///
/// Cloning shares the underlying storage.
#[derive(Clone)]
pub struct Session {
    storage: Arc<dyn SessionStorage>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("storage", &"<storage>")
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Session {
    /// Create a session over any storage backend
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Create a session over a shared storage backend
    pub fn from_arc(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Create a session held only in memory
    pub fn in_memory() -> Self {
        Self::new(InMemoryStorage::new())
    }

    pub async fn token(&self) -> Result<Option<String>> {
        self.storage.get(storage_keys::TOKEN).await
    }

    pub async fn set_token(&self, token: &str) -> Result<()> {
        self.storage.set(storage_keys::TOKEN, token).await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>> {
        self.storage.get(storage_keys::REFRESH_TOKEN).await
    }

    pub async fn set_refresh_token(&self, token: &str) -> Result<()> {
        self.storage.set(storage_keys::REFRESH_TOKEN, token).await
    }

    /// Stored user profile; an unreadable entry counts as absent
    pub async fn user(&self) -> Result<Option<UserProfile>> {
        let Some(raw) = self.storage.get(storage_keys::USER).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable stored user profile: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn set_user(&self, user: &UserProfile) -> Result<()> {
        let raw = serde_json::to_string(user)?;
        self.storage.set(storage_keys::USER, &raw).await
    }

    pub async fn sigma_key(&self) -> Result<Option<String>> {
        self.storage.get(storage_keys::SIGMA).await
    }

    pub async fn set_sigma_key(&self, key: &str) -> Result<()> {
        self.storage.set(storage_keys::SIGMA, key).await
    }

    /// Read every session key at once
    pub async fn snapshot(&self) -> Result<SessionState> {
        Ok(SessionState {
            token: self.token().await?,
            refresh_token: self.refresh_token().await?,
            user: self.user().await?,
            sigma_key: self.sigma_key().await?,
        })
    }

    /// Drop all session state
    pub async fn clear(&self) -> Result<()> {
        self.storage.clear().await
    }
}
