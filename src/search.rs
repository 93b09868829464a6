//! Read side: radius and threshold searches over the `post` collection.
//!
//! Both searches go straight to the document store and decode whatever comes
//! back. Hits that are not well-formed posts are skipped, so a search either
//! fails as a whole at the store or returns the posts it could read.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{NearbyError, Result};
use crate::geo::{Distance, GeoPoint};
use crate::ingest::DEFAULT_STEP_TIMEOUT;
use crate::query::{GeoDistanceQuery, Query, RangeQuery};
use crate::record::{POST_COLLECTION, Record, StoredDocument};
use crate::store::{DocumentStore, SearchHits};
use crate::util::with_deadline;

/// Stored field holding a post's location.
pub const LOCATION_FIELD: &str = "location";

/// Default lower bound of a threshold search.
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Default cap on returned hits; the store's largest result window.
pub const DEFAULT_SEARCH_LIMIT: usize = 10_000;

/// Stateless query engine over the `post` collection.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    documents: Arc<dyn DocumentStore>,
    default_radius: Distance,
    default_threshold: f64,
    limit: usize,
    step_timeout: Duration,
}

impl SearchEngine {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        SearchEngine {
            documents,
            default_radius: Distance::default(),
            default_threshold: DEFAULT_THRESHOLD,
            limit: DEFAULT_SEARCH_LIMIT,
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_default_radius(mut self, radius: Distance) -> Self {
        self.default_radius = radius;
        self
    }

    pub fn with_default_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = threshold;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Posts within `radius` (default 200 km) of `(lat, lon)`, in store order.
    pub async fn search_by_radius(
        &self,
        lat: f64,
        lon: f64,
        radius: Option<Distance>,
    ) -> Result<Vec<Record>> {
        let center = GeoPoint::new(lat, lon);
        if !center.is_valid() {
            return Err(NearbyError::invalid_input(format!(
                "coordinates ({lat}, {lon}) are out of range"
            )));
        }
        let radius = radius.unwrap_or(self.default_radius);
        let query = GeoDistanceQuery::new(LOCATION_FIELD, center, radius).into();
        self.run(query).await
    }

    /// Posts whose numeric `field` is at least `min` (default 0.9).
    ///
    /// The field name is passed to the store as given.
    pub async fn search_by_threshold(&self, field: &str, min: Option<f64>) -> Result<Vec<Record>> {
        if field.is_empty() {
            return Err(NearbyError::invalid_input("threshold field is empty"));
        }
        let min = min.unwrap_or(self.default_threshold);
        if !min.is_finite() {
            return Err(NearbyError::invalid_input(format!(
                "threshold {min} is not a number"
            )));
        }
        let query = RangeQuery::greater_than_or_equal(field, min).into();
        self.run(query).await
    }

    async fn run(&self, query: Query) -> Result<Vec<Record>> {
        tracing::debug!(query = %query.description(), "searching posts");
        let hits = with_deadline(
            "document search",
            self.step_timeout,
            self.documents.search(POST_COLLECTION, &query, self.limit),
        )
        .await?;

        let total = hits.total;
        let records = decode_records(hits);
        tracing::info!(total, returned = records.len(), "search finished");
        Ok(records)
    }
}

/// Decode search hits into records, skipping anything that is not a post.
pub fn decode_records(hits: SearchHits) -> Vec<Record> {
    hits.hits
        .into_iter()
        .filter_map(|hit| match StoredDocument::from_json(hit.source) {
            Ok(StoredDocument::Post(mut record)) => {
                if record.id.is_empty() {
                    record.id = hit.id;
                }
                Some(record)
            }
            Ok(other) => {
                tracing::debug!(id = %hit.id, kind = other.collection(), "skipping non-post hit");
                None
            }
            Err(e) => {
                tracing::warn!(id = %hit.id, error = %e, "skipping malformed hit");
                None
            }
        })
        .collect()
}
