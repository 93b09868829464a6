//! Scoring adapter for uploaded images.
//!
//! A [`Scorer`] receives the canonical URI of a stored image and returns a
//! detection confidence in `[0, 1]`, or `None` when it has no answer for
//! this image. `None` is not an error: the pipeline records a score of zero.

pub mod http;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{NearbyError, Result};

/// Scores images by URI.
#[async_trait]
pub trait Scorer: Send + Sync + std::fmt::Debug {
    async fn score(&self, uri: &str) -> Result<Option<f32>>;
}

/// A scorer that never has an answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledScorer;

#[async_trait]
impl Scorer for DisabledScorer {
    async fn score(&self, _uri: &str) -> Result<Option<f32>> {
        Ok(None)
    }
}

/// A scorer that gives the same answer for every image.
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer {
    confidence: Option<f32>,
}

impl FixedScorer {
    pub fn new(confidence: Option<f32>) -> Result<Self> {
        if let Some(c) = confidence {
            check_confidence(c as f64)?;
        }
        Ok(FixedScorer { confidence })
    }
}

#[async_trait]
impl Scorer for FixedScorer {
    async fn score(&self, _uri: &str) -> Result<Option<f32>> {
        Ok(self.confidence)
    }
}

/// Fail unless `confidence` is a finite number in `[0, 1]`.
pub(crate) fn check_confidence(confidence: f64) -> Result<f32> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(confidence as f32)
    } else {
        Err(NearbyError::scoring(format!(
            "confidence {confidence} is outside [0, 1]"
        )))
    }
}

/// Configuration for scorer backends.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ScorerConfig {
    /// Never score; every image gets zero
    #[default]
    Disabled,

    /// Constant answer, for local development
    Fixed {
        #[serde(default)]
        confidence: Option<f32>,
    },

    /// Remote scoring service
    Http(http::HttpScorerConfig),
}

/// A factory for creating scorer instances.
pub struct ScorerFactory;

impl ScorerFactory {
    pub fn create(config: ScorerConfig) -> Result<Arc<dyn Scorer>> {
        match config {
            ScorerConfig::Disabled => Ok(Arc::new(DisabledScorer)),
            ScorerConfig::Fixed { confidence } => Ok(Arc::new(FixedScorer::new(confidence)?)),
            ScorerConfig::Http(http_config) => {
                Ok(Arc::new(http::HttpScorer::new(http_config)?))
            }
        }
    }
}
