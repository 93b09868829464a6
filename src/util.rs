//! Small helpers shared by the pipeline, the search engine and the auth layer.

use std::future::Future;
use std::time::Duration;

use crate::error::{NearbyError, Result};

/// Run one adapter call under a deadline.
///
/// Expiry drops the in-flight future and yields a `Timeout` error naming the
/// step.
pub async fn with_deadline<T, F>(step: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(NearbyError::timeout(format!(
            "{step} did not finish within {}ms",
            limit.as_millis()
        ))),
    }
}
