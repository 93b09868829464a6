//! Remote scoring service over HTTP.
//!
//! The service is called with `POST {endpoint}` and a JSON body
//! `{"uri": "<storage uri>"}`, and answers `{"confidence": <number|null>}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{NearbyError, Result};
use crate::scoring::{Scorer, check_confidence};

fn default_timeout_secs() -> u64 {
    20
}

/// Configuration for [`HttpScorer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpScorerConfig {
    /// Full URL of the scoring endpoint.
    pub endpoint: String,

    /// Sent as a bearer token when present.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Request structure for the scoring endpoint.
#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    uri: &'a str,
}

/// Response structure from the scoring endpoint.
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    #[serde(default)]
    confidence: Option<f64>,
}

/// A [`Scorer`] that asks a remote service.
pub struct HttpScorer {
    /// HTTP client for making API requests.
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpScorer")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl HttpScorer {
    pub fn new(config: HttpScorerConfig) -> Result<Self> {
        if config.endpoint.is_empty() {
            return Err(NearbyError::config("scorer endpoint is empty"));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(HttpScorer {
            client,
            endpoint: config.endpoint,
            api_key: config.api_key,
        })
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, uri: &str) -> Result<Option<f32>> {
        let mut request = self.client.post(&self.endpoint).json(&ScoreRequest { uri });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let http_response = request
            .send()
            .await
            .map_err(|e| NearbyError::scoring(format!("scoring request failed: {e}")))?;

        let status = http_response.status();
        let response_text = http_response
            .text()
            .await
            .map_err(|e| NearbyError::scoring(format!("Failed to read response text: {e}")))?;

        if !status.is_success() {
            return Err(NearbyError::scoring(format!(
                "scoring service error (status {status}): {response_text}"
            )));
        }

        let response: ScoreResponse = serde_json::from_str(&response_text).map_err(|e| {
            NearbyError::scoring(format!(
                "Failed to parse scoring response: {e}. Response text: {response_text}"
            ))
        })?;

        response.confidence.map(check_confidence).transpose()
    }
}
