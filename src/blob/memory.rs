//! In-memory object store implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::blob::{ObjectStore, StoredObject, public_url, validate_key};
use crate::error::Result;

fn default_bucket() -> String {
    "nearby-media".to_string()
}

fn default_public_base_url() -> String {
    "/media".to_string()
}

/// Configuration specific to memory-based object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryObjectStoreConfig {
    /// Bucket name used in `mem://` URIs.
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Prefix of the public URLs handed out for stored objects.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for MemoryObjectStoreConfig {
    fn default() -> Self {
        MemoryObjectStoreConfig {
            bucket: default_bucket(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// An in-memory object store.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<String, Bytes>>,
    config: MemoryObjectStoreConfig,
}

impl MemoryObjectStore {
    pub fn new(config: MemoryObjectStoreConfig) -> Self {
        MemoryObjectStore {
            objects: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Read an object back.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// Get the number of objects stored.
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new(MemoryObjectStoreConfig::default())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<StoredObject> {
        validate_key(key)?;
        self.objects.write().insert(key.to_string(), bytes);

        Ok(StoredObject {
            key: key.to_string(),
            url: public_url(&self.config.public_base_url, key),
            uri: self.location_uri(key),
        })
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.objects.write().remove(key).is_some())
    }

    fn location_uri(&self, key: &str) -> String {
        format!("mem://{}/{key}", self.config.bucket)
    }
}
