//! Key-value persistence behind the catalog.
//!
//! Values are JSON documents. Three backends share the `Storage` trait:
//! an in-process map, one JSON file per key on disk, and Redis.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::errors::StorageError;

/// Asynchronous key-value store with string keys and JSON values
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    async fn list_keys(&self) -> Result<Vec<String>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;
}

/// Typed access on top of any `Storage`
#[async_trait]
pub trait StorageExt {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, StorageError>;

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError>;
}

#[async_trait]
impl<S: Storage + ?Sized> StorageExt for S {
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value)?;
        self.set(key, value).await
    }
}

// ============ Memory ============

/// Process-local storage, lost on restart
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.read().await.contains_key(key))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// ============ Disk ============

const FILE_EXT: &str = ".json";
const TMP_EXT: &str = ".json.tmp";

/// Percent-encode a key into a file name
fn encode_key(key: &str) -> String {
    let encoded = urlencoding::encode(key);
    // a leading dot would hide the file
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded.into_owned(),
    }
}

fn decode_key(name: &str) -> Option<String> {
    urlencoding::decode(name).ok().map(|key| key.into_owned())
}

/// One JSON file per key under a directory.
/// Writes go to a temp file first and are renamed into place.
#[derive(Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if missing) the storage directory
    pub async fn new(dir: &str) -> Result<Self, StorageError> {
        let dir = PathBuf::from(dir);
        fs::create_dir_all(&dir).await?;

        // leftovers from writes interrupted by a crash
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().ends_with(TMP_EXT) {
                if let Err(e) = fs::remove_file(entry.path()).await {
                    tracing::warn!("Failed to remove stale temp file {}: {}", entry.path().display(), e);
                }
            }
        }

        tracing::info!("File storage ready at {}", dir.display());
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", encode_key(key), FILE_EXT))
    }

    fn tmp_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", encode_key(key), TMP_EXT))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        match fs::read(self.path(key)).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.path(key);
        let tmp_path = self.tmp_path(key);
        let content = serde_json::to_vec(&value)?;

        let mut file = File::create(&tmp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        // Atomic replace to avoid readers seeing partial writes
        fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let Some(stem) = file_name.strip_suffix(FILE_EXT) else {
                continue;
            };
            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => tracing::warn!("Ignoring unexpected file in storage: {}", file_name),
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(fs::metadata(self.path(key)).await.is_ok())
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

// ============ Redis ============

/// Redis-backed storage; every key lives under `<namespace>:`
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisStorage {
    /// Connect with a managed (auto-reconnecting) connection
    pub async fn new(redis_url: &str, namespace: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            namespace: namespace.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Ping Redis to check connection
    pub async fn ping(&self) -> Result<bool, StorageError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[async_trait]
impl Storage for RedisStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.namespaced(key)).await?;
        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let serialized = serde_json::to_string(&value)?;
        let _: () = conn.set(self.namespaced(key), serialized).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(self.namespaced(key)).await?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut conn = self.conn.clone();
        let prefix = format!("{}:", self.namespace);
        let raw: Vec<String> = conn.keys(format!("{}*", prefix)).await?;
        let mut keys: Vec<String> = raw
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(self.namespaced(key)).await?;
        Ok(exists)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
