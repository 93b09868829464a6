//! In-memory document store for testing and single-node development.
//!
//! Queries are evaluated against the declared mapping the way a real
//! document index evaluates them: geo queries need a `geo_point` field, term
//! queries need an indexed keyword field, and numeric ranges over a `float`
//! field compare at single precision.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NearbyError, Result};
use crate::query::Query;
use crate::store::{CollectionSchema, DocumentStore, FieldType, Hit, SearchHits};

/// Configuration for [`MemoryDocumentStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocumentStoreConfig {
    /// When set, the full store is written to this JSON file after every
    /// change and loaded from it on open.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    seq: u64,
    source: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Collection {
    schema: CollectionSchema,
    documents: HashMap<String, StoredEntry>,
    next_seq: u64,
}

impl Collection {
    fn new(schema: CollectionSchema) -> Self {
        Collection {
            schema,
            documents: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Decide whether the query can run against this mapping, and if so,
    /// whether `source` matches it.
    fn matches(&self, query: &Query, source: &Value) -> Result<bool> {
        let field = query.field();
        let mapping = self.schema.field(field);

        match query {
            Query::GeoDistance(q) => match mapping {
                Some(m) if m.field_type == FieldType::GeoPoint => Ok(q.matches(source)),
                _ => Err(NearbyError::query(format!(
                    "failed to find geo field [{field}] in collection [{}]",
                    self.schema.name()
                ))),
            },
            Query::Term(q) => match mapping {
                None => Ok(false),
                Some(m) if !m.indexed => Err(NearbyError::query(format!(
                    "cannot search on field [{field}] since it is not indexed"
                ))),
                Some(m) if m.field_type != FieldType::Keyword => Err(NearbyError::query(format!(
                    "term query on [{field}] requires a keyword field, found {}",
                    m.field_type.as_str()
                ))),
                Some(_) => Ok(q.matches(source)),
            },
            Query::Range(q) => match mapping {
                None => Ok(false),
                Some(m) if !m.indexed => Err(NearbyError::query(format!(
                    "cannot search on field [{field}] since it is not indexed"
                ))),
                Some(m) if !m.field_type.is_numeric() => Err(NearbyError::query(format!(
                    "range query on [{field}] requires a numeric field, found {}",
                    m.field_type.as_str()
                ))),
                Some(m) if m.field_type == FieldType::Float => Ok(q.matches_as_f32(source)),
                Some(_) => Ok(q.matches(source)),
            },
        }
    }
}

/// An in-process [`DocumentStore`].
///
/// Hits are returned in insertion order. An upsert to a collection that was
/// never provisioned creates it with an empty mapping, so only term and range
/// queries that match nothing will succeed against it.
#[derive(Debug)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    snapshot_path: Option<PathBuf>,
    /// Serializes snapshot writes so an older state never lands last.
    persist_lock: tokio::sync::Mutex<()>,
}

impl MemoryDocumentStore {
    /// Create an empty store that is never persisted.
    pub fn new() -> Self {
        MemoryDocumentStore {
            collections: RwLock::new(HashMap::new()),
            snapshot_path: None,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open a store, loading the snapshot if one is configured and exists.
    pub fn open(config: MemoryDocumentStoreConfig) -> Result<Self> {
        let collections = match &config.snapshot_path {
            Some(path) if path.exists() => load_snapshot(path)?,
            _ => HashMap::new(),
        };

        Ok(MemoryDocumentStore {
            collections: RwLock::new(collections),
            snapshot_path: config.snapshot_path,
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Number of documents in a collection, zero if it does not exist.
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.documents.len())
    }

    /// Fetch a document by id.
    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.collections
            .read()
            .get(collection)
            .and_then(|c| c.documents.get(id))
            .map(|entry| entry.source.clone())
    }

    /// Apply a mutation.
    ///
    /// With a snapshot configured the mutation runs on a copy of the
    /// collections, and the copy becomes visible only once the snapshot
    /// holding it is on disk. A failed or cancelled write leaves the store
    /// exactly as it was.
    async fn mutate<T>(&self, f: impl FnOnce(&mut HashMap<String, Collection>) -> T) -> Result<T> {
        let _guard = self.persist_lock.lock().await;

        let Some(path) = &self.snapshot_path else {
            return Ok(f(&mut *self.collections.write()));
        };

        // Every writer holds `persist_lock`, so nothing changes the map
        // between this copy and the swap below.
        let mut staged = self.collections.read().clone();
        let result = f(&mut staged);
        let bytes = serde_json::to_vec(&staged)?;
        write_snapshot(path, &bytes).await?;

        *self.collections.write() = staged;
        Ok(result)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn ensure_collection(&self, schema: &CollectionSchema) -> Result<bool> {
        let exists = self.collections.read().contains_key(schema.name());
        if exists {
            return Ok(false);
        }

        self.mutate(|collections| {
            if collections.contains_key(schema.name()) {
                false
            } else {
                collections.insert(schema.name().to_string(), Collection::new(schema.clone()));
                true
            }
        })
        .await
    }

    async fn upsert(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        self.mutate(|collections| {
            let target = collections
                .entry(collection.to_string())
                .or_insert_with(|| Collection::new(CollectionSchema::new(collection)));
            let seq = target.next_seq;
            target.next_seq += 1;
            target.documents.insert(
                id.to_string(),
                StoredEntry {
                    seq,
                    source: document,
                },
            );
        })
        .await
    }

    async fn create(&self, collection: &str, id: &str, document: Value) -> Result<bool> {
        self.mutate(|collections| {
            let target = collections
                .entry(collection.to_string())
                .or_insert_with(|| Collection::new(CollectionSchema::new(collection)));
            if target.documents.contains_key(id) {
                return false;
            }
            let seq = target.next_seq;
            target.next_seq += 1;
            target.documents.insert(
                id.to_string(),
                StoredEntry {
                    seq,
                    source: document,
                },
            );
            true
        })
        .await
    }

    async fn search(&self, collection: &str, query: &Query, limit: usize) -> Result<SearchHits> {
        let collections = self.collections.read();
        let target = collections.get(collection).ok_or_else(|| {
            NearbyError::document_store(format!("no such collection [{collection}]"))
        })?;

        let mut matched = Vec::new();
        for (id, entry) in &target.documents {
            if target.matches(query, &entry.source)? {
                matched.push((entry.seq, id, &entry.source));
            }
        }
        matched.sort_by_key(|(seq, _, _)| *seq);

        Ok(SearchHits {
            total: matched.len() as u64,
            hits: matched
                .into_iter()
                .take(limit)
                .map(|(_, id, source)| Hit {
                    id: id.clone(),
                    source: source.clone(),
                })
                .collect(),
        })
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        self.mutate(|collections| {
            collections
                .get_mut(collection)
                .is_some_and(|c| c.documents.remove(id).is_some())
        })
        .await
    }
}

fn load_snapshot(path: &Path) -> Result<HashMap<String, Collection>> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        NearbyError::document_store(format!(
            "failed to load snapshot {}: {e}",
            path.display()
        ))
    })
}

/// Write to a sibling temp file, then rename over the snapshot.
async fn write_snapshot(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    tokio::fs::write(&temp, bytes).await?;
    tokio::fs::rename(&temp, path).await?;
    Ok(())
}
