//! Document store abstraction.
//!
//! The document store is the system of record for posts and user accounts.
//! It is a schema-less document index reached through the [`DocumentStore`]
//! trait, so the in-process store used in tests and development and the
//! Elasticsearch store used in production can be swapped without touching
//! the pipeline or the search engine.
//!
//! # Backends
//!
//! - [`memory::MemoryDocumentStore`]: in-process, optionally snapshotted to a
//!   JSON file, evaluates queries itself with store-like mapping rules.
//! - [`elastic::ElasticDocumentStore`]: talks to an Elasticsearch-compatible
//!   HTTP API.
//!
//! # Example
//!
//! ```
//! use nearby::store::{DocumentStoreConfig, DocumentStoreFactory};
//!
//! # fn main() -> nearby::error::Result<()> {
//! let store = DocumentStoreFactory::create(DocumentStoreConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod elastic;
pub mod memory;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::query::Query;

pub use self::schema::{CollectionSchema, FieldMapping, FieldType};

/// One matching document.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Primary key of the document.
    pub id: String,
    /// The stored JSON body, as written by `upsert`.
    pub source: Value,
}

/// The result of a search: matching documents in store order plus the total
/// number of matches (which may exceed `hits.len()` when a limit applied).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<Hit>,
}

/// A schema-less document index.
///
/// Implementations must be safe for concurrent use; callers add no locking.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Create the collection with the given explicit mapping unless it
    /// already exists. Returns `true` when it was created.
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<bool>;

    /// Insert or replace the document stored under `id`.
    async fn upsert(&self, collection: &str, id: &str, document: Value) -> Result<()>;

    /// Store the document under `id` only if no document has that id.
    /// Returns `false`, leaving the existing document alone, when one does.
    /// The check and the write are a single atomic operation.
    async fn create(&self, collection: &str, id: &str, document: Value) -> Result<bool>;

    /// Run a query and return at most `limit` hits.
    async fn search(&self, collection: &str, query: &Query, limit: usize) -> Result<SearchHits>;

    /// Delete a document. Returns `false` when it did not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;
}

/// Configuration for document store backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DocumentStoreConfig {
    /// In-process store configuration
    Memory(memory::MemoryDocumentStoreConfig),

    /// Elasticsearch-compatible HTTP store configuration
    Elasticsearch(elastic::ElasticDocumentStoreConfig),
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        DocumentStoreConfig::Memory(memory::MemoryDocumentStoreConfig::default())
    }
}

/// A factory for creating document store instances.
pub struct DocumentStoreFactory;

impl DocumentStoreFactory {
    /// Create a new document store with the given configuration.
    pub fn create(config: DocumentStoreConfig) -> Result<Arc<dyn DocumentStore>> {
        match config {
            DocumentStoreConfig::Memory(mem_config) => {
                let store = memory::MemoryDocumentStore::open(mem_config)?;
                Ok(Arc::new(store))
            }
            DocumentStoreConfig::Elasticsearch(es_config) => {
                let store = elastic::ElasticDocumentStore::new(es_config)?;
                Ok(Arc::new(store))
            }
        }
    }
}

/// Make sure the `post` and `user` collections exist with their explicit
/// mappings. Safe to run on every startup.
pub async fn provision(store: &dyn DocumentStore) -> Result<()> {
    for schema in [CollectionSchema::post(), CollectionSchema::user()] {
        if store.ensure_collection(&schema).await? {
            tracing::info!(collection = schema.name(), "collection created");
        } else {
            tracing::debug!(collection = schema.name(), "collection already exists");
        }
    }
    Ok(())
}
