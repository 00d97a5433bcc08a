//! Persistent key-value storage boundary.
//!
//! The monitor stores its history, profiles and active profile id as
//! versioned JSON documents under distinct keys. Missing or unreadable
//! documents are treated as empty; a store that fails or times out puts the
//! session into in-memory-only mode instead of failing the caller.

use crate::error::StorageError;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub const HISTORY_KEY: &str = "compliance-history";
pub const PROFILES_KEY: &str = "accessibility-profiles";
pub const ACTIVE_PROFILE_KEY: &str = "active-profile";

/// Layout version of every persisted document.
pub const FORMAT_VERSION: u32 = 1;

pub const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(2);

/// A string key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>>;
    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StorageError>>;
}

/// Volatile store, also used as the fallback when nothing is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        let result = self
            .entries
            .lock()
            .map(|entries| entries.get(key).cloned())
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()));
        async move { result }.boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StorageError>> {
        let result = self
            .entries
            .lock()
            .map(|mut entries| {
                entries.insert(key.to_string(), value);
            })
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()));
        async move { result }.boxed()
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl KeyValueStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        async move {
            let path = self.path_for(key);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => Ok(Some(content)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StorageError::Unavailable(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                ))),
            }
        }
        .boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, Result<(), StorageError>> {
        async move {
            tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
                StorageError::Unavailable(format!("cannot create {}: {}", self.dir.display(), e))
            })?;

            let path = self.path_for(key);
            let tmp = path.with_extension("json.tmp");
            tokio::fs::write(&tmp, value).await.map_err(|e| {
                StorageError::Unavailable(format!("cannot write {}: {}", tmp.display(), e))
            })?;
            tokio::fs::rename(&tmp, &path).await.map_err(|e| {
                StorageError::Unavailable(format!("cannot replace {}: {}", path.display(), e))
            })
        }
        .boxed()
    }
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn<T> {
    version: u32,
    data: T,
}

/// Serialize `data` into the versioned document format.
pub fn encode<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&EnvelopeOut {
        version: FORMAT_VERSION,
        data,
    })
}

/// Parse a versioned document. Unknown versions are reported as corrupt.
pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StorageError> {
    let header: serde_json::Value = serde_json::from_str(raw).map_err(|e| StorageError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })?;

    let version = header.get("version").and_then(|v| v.as_u64());
    if version != Some(FORMAT_VERSION as u64) {
        return Err(StorageError::Corrupt {
            key: key.to_string(),
            reason: format!("unsupported layout version {:?}", version),
        });
    }

    let envelope: EnvelopeIn<T> =
        serde_json::from_value(header).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    debug!("Decoded '{}' (version {})", key, envelope.version);
    Ok(envelope.data)
}

/// Timeout-guarded, failure-tolerant access to a [`KeyValueStore`].
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
    timeout: Duration,
    degraded: bool,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            degraded: false,
        }
    }

    /// In-memory persistence, for embedding and tests.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_STORAGE_TIMEOUT)
    }

    /// True once a store failure switched the session to in-memory operation.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Load a document; absence, corruption and failures all yield `None`.
    pub async fn load<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        if self.degraded {
            return None;
        }

        let raw = match tokio::time::timeout(self.timeout, self.store.get(key)).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!("Nothing stored under '{}'", key);
                return None;
            }
            Ok(Err(e)) => {
                self.degrade(e);
                return None;
            }
            Err(_) => {
                self.degrade(StorageError::Timeout(key.to_string()));
                return None;
            }
        };

        match decode(key, &raw) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("{}; treating as empty", e);
                None
            }
        }
    }

    /// Store a document. Returns whether it was written.
    pub async fn save<T: Serialize>(&mut self, key: &str, data: &T) -> bool {
        if self.degraded {
            return false;
        }

        let encoded = match encode(data) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Cannot encode '{}': {}", key, e);
                return false;
            }
        };

        match tokio::time::timeout(self.timeout, self.store.set(key, encoded)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                self.degrade(e);
                false
            }
            Err(_) => {
                self.degrade(StorageError::Timeout(key.to_string()));
                false
            }
        }
    }

    fn degrade(&mut self, error: StorageError) {
        warn!(
            "Storage failed ({}); continuing in memory for the rest of the session",
            error
        );
        self.degraded = true;
    }
}
