//! Object store abstraction for uploaded media.
//!
//! Uploaded files are written under a caller-chosen key (the post id) and
//! become publicly readable at a stable URL. The pipeline only needs three
//! things from a backend: write an object, delete it again when compensating,
//! and name its canonical location so the scorer can fetch it.
//!
//! # Backends
//!
//! - [`memory::MemoryObjectStore`]: objects kept in memory, for tests.
//! - [`file::FileObjectStore`]: one directory is one bucket; served over HTTP
//!   by the server's `/media` route.
//!
//! # Example
//!
//! ```
//! use nearby::blob::{ObjectStoreConfig, ObjectStoreFactory};
//! use nearby::blob::memory::MemoryObjectStoreConfig;
//!
//! # fn main() -> nearby::error::Result<()> {
//! let store = ObjectStoreFactory::create(ObjectStoreConfig::Memory(
//!     MemoryObjectStoreConfig::default(),
//! ))?;
//! assert_eq!(store.location_uri("abc"), "mem://nearby-media/abc");
//! # Ok(())
//! # }
//! ```

pub mod file;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{NearbyError, Result};

/// Where an object ended up after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// The key it was written under.
    pub key: String,
    /// Public HTTP URL, stored on the record.
    pub url: String,
    /// Canonical storage URI, handed to the scorer.
    pub uri: String,
}

/// A bucket of publicly readable objects.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Write `bytes` under `key`, replacing any previous object.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<StoredObject>;

    /// Remove the object. Returns `false` when there was nothing to remove.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Canonical URI of the object stored (or to be stored) under `key`.
    fn location_uri(&self, key: &str) -> String;
}

/// Reject keys that are empty or could escape the bucket.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(NearbyError::object_store("object key is empty"));
    }
    if key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(NearbyError::object_store(format!(
            "object key '{key}' contains a path separator or '..'"
        )));
    }
    Ok(())
}

/// Join a public base URL and a key with exactly one slash.
pub(crate) fn public_url(base: &str, key: &str) -> String {
    format!("{}/{key}", base.trim_end_matches('/'))
}

/// Configuration for object store backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory object store configuration
    Memory(memory::MemoryObjectStoreConfig),

    /// Directory-backed object store configuration (includes path)
    File(file::FileObjectStoreConfig),
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        ObjectStoreConfig::File(file::FileObjectStoreConfig::default())
    }
}

/// A factory for creating object store instances.
pub struct ObjectStoreFactory;

impl ObjectStoreFactory {
    /// Create a new object store with the given configuration.
    pub fn create(config: ObjectStoreConfig) -> Result<Arc<dyn ObjectStore>> {
        match config {
            ObjectStoreConfig::Memory(mem_config) => {
                Ok(Arc::new(memory::MemoryObjectStore::new(mem_config)))
            }
            ObjectStoreConfig::File(file_config) => {
                let store = file::FileObjectStore::new(file_config)?;
                Ok(Arc::new(store))
            }
        }
    }
}
