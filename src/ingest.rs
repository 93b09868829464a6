//! Ingestion pipeline: media to the object store, optional scoring, then the
//! record to the document store.
//!
//! The steps run strictly in sequence and any of them can fail. A failure
//! after the object write leaves an orphaned object behind; what happens to
//! it is decided by the configured [`CompensationPolicy`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use nearby::blob::memory::MemoryObjectStore;
//! use nearby::ingest::{IngestPipeline, IngestRequest, MediaUpload};
//! use nearby::record::MediaKind;
//! use nearby::scoring::FixedScorer;
//! use nearby::store::memory::MemoryDocumentStore;
//!
//! # #[tokio::main]
//! # async fn main() -> nearby::error::Result<()> {
//! let pipeline = IngestPipeline::new(
//!     Arc::new(MemoryObjectStore::default()),
//!     Arc::new(FixedScorer::new(Some(0.97))?),
//!     Arc::new(MemoryDocumentStore::new()),
//! );
//!
//! let record = pipeline
//!     .ingest(IngestRequest {
//!         author: "alice".to_string(),
//!         message: "sunset".to_string(),
//!         lat: 37.77,
//!         lon: -122.42,
//!         media: Some(MediaUpload::new("sunset.jpg", Bytes::from_static(b"..."))),
//!     })
//!     .await?;
//!
//! assert_eq!(record.media_kind, MediaKind::Image);
//! assert_eq!(record.score, 0.97);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::blob::ObjectStore;
use crate::error::{NearbyError, Result};
use crate::geo::GeoPoint;
use crate::record::{MediaKind, MediaKindTable, POST_COLLECTION, Record, StoredDocument};
use crate::scoring::Scorer;
use crate::store::DocumentStore;
use crate::util::with_deadline;

/// Default deadline for each adapter call.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Parse a `lat`/`lon` form value. Anything unparsable becomes `0.0`.
pub fn parse_coordinate(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// An uploaded file, already read in full.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// Client-supplied file name; only its extension is used.
    pub filename: String,
    pub bytes: Bytes,
}

impl MediaUpload {
    pub fn new<S: Into<String>>(filename: S, bytes: Bytes) -> Self {
        MediaUpload {
            filename: filename.into(),
            bytes,
        }
    }
}

/// One post to ingest.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Verified identity of the poster.
    pub author: String,
    pub message: String,
    pub lat: f64,
    pub lon: f64,
    pub media: Option<MediaUpload>,
}

/// What to do with a stored object when a later step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompensationPolicy {
    /// Leave the object in place and log its key.
    #[default]
    Retain,
    /// Try to delete the object.
    DeleteObject,
}

/// Undo actions recorded by completed steps.
#[derive(Debug)]
enum Compensation {
    RemoveObject { key: String },
}

/// The ingestion pipeline.
///
/// Holds its three collaborators by shared handle; one pipeline serves any
/// number of concurrent requests.
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    objects: Arc<dyn ObjectStore>,
    scorer: Arc<dyn Scorer>,
    documents: Arc<dyn DocumentStore>,
    media_kinds: Arc<MediaKindTable>,
    compensation: CompensationPolicy,
    step_timeout: Duration,
}

impl IngestPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        scorer: Arc<dyn Scorer>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        IngestPipeline {
            objects,
            scorer,
            documents,
            media_kinds: Arc::new(MediaKindTable::default()),
            compensation: CompensationPolicy::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    /// Replace the extension table.
    pub fn with_media_kinds(mut self, media_kinds: MediaKindTable) -> Self {
        self.media_kinds = Arc::new(media_kinds);
        self
    }

    pub fn with_compensation(mut self, compensation: CompensationPolicy) -> Self {
        self.compensation = compensation;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn media_kinds(&self) -> &MediaKindTable {
        &self.media_kinds
    }

    /// Ingest one post and return the record as indexed.
    ///
    /// On success exactly one document was upserted into `post`, and at most
    /// one object was written and one scoring call made.
    pub async fn ingest(&self, request: IngestRequest) -> Result<Record> {
        if request.author.is_empty() {
            return Err(NearbyError::invalid_input("author is empty"));
        }
        let location = GeoPoint::new(request.lat, request.lon);
        if !location.is_valid() {
            tracing::warn!(
                lat = request.lat,
                lon = request.lon,
                "coordinates out of range; storing as given"
            );
        }

        let mut record = Record {
            id: Uuid::new_v4().to_string(),
            author: request.author,
            message: request.message,
            location,
            media_url: String::new(),
            media_kind: MediaKind::Unknown,
            score: 0.0,
        };

        let mut compensations = Vec::new();
        match self.run(&mut record, request.media, &mut compensations).await {
            Ok(()) => {
                tracing::info!(
                    id = %record.id,
                    author = %record.author,
                    media_kind = %record.media_kind,
                    score = record.score,
                    "post ingested"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::error!(id = %record.id, error = %e, "ingest failed");
                self.unwind(compensations, &e).await;
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        record: &mut Record,
        media: Option<MediaUpload>,
        compensations: &mut Vec<Compensation>,
    ) -> Result<()> {
        if let Some(media) = media {
            record.media_kind = self.media_kinds.kind_for_filename(&media.filename);

            let stored = self
                .step("object put", self.objects.put(&record.id, media.bytes))
                .await?;
            compensations.push(Compensation::RemoveObject {
                key: stored.key.clone(),
            });
            record.media_url = stored.url;

            if record.media_kind == MediaKind::Image {
                let confidence = self.step("score", self.scorer.score(&stored.uri)).await?;
                if confidence.is_none() {
                    tracing::debug!(id = %record.id, "scorer had no answer");
                }
                record.score = confidence.unwrap_or(0.0);
            }
        }

        let document = StoredDocument::Post(record.clone()).to_json()?;
        self.step(
            "document upsert",
            self.documents.upsert(POST_COLLECTION, &record.id, document),
        )
        .await
    }

    async fn step<T, F>(&self, name: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tracing::debug!(step = name, "running");
        with_deadline(name, self.step_timeout, call).await
    }

    /// Run recorded compensations, newest first. Never fails; problems are
    /// logged and the caller keeps its original error.
    async fn unwind(&self, compensations: Vec<Compensation>, cause: &NearbyError) {
        for compensation in compensations.into_iter().rev() {
            match compensation {
                Compensation::RemoveObject { key } => match self.compensation {
                    CompensationPolicy::Retain => {
                        tracing::warn!(key = %key, cause = %cause, "orphaned object retained");
                    }
                    CompensationPolicy::DeleteObject => {
                        match self.step("object delete", self.objects.delete(&key)).await {
                            Ok(_) => tracing::info!(key = %key, "orphaned object deleted"),
                            Err(e) => tracing::error!(
                                key = %key,
                                error = %e,
                                "failed to delete orphaned object"
                            ),
                        }
                    }
                },
            }
        }
    }
}
