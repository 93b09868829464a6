//! Service configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a valid configuration: file-backed media under `./media`, the in-process
//! document store, and scoring disabled.
//!
//! ```
//! use nearby::config::ServiceConfig;
//!
//! let config = ServiceConfig::from_json_str(r#"{"threshold": 0.8}"#).unwrap();
//! assert_eq!(config.threshold, 0.8);
//! assert_eq!(config.search_limit, 10_000);
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blob::ObjectStoreConfig;
use crate::error::{NearbyError, Result};
use crate::geo::Distance;
use crate::ingest::CompensationPolicy;
use crate::record::MediaKindTable;
use crate::scoring::ScorerConfig;
use crate::search::{DEFAULT_SEARCH_LIMIT, DEFAULT_THRESHOLD};
use crate::store::DocumentStoreConfig;

/// Token settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing key. When absent a random key is generated at startup.
    pub signing_key: Option<String>,
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            signing_key: None,
            token_ttl_secs: 60 * 60,
        }
    }
}

/// Everything needed to assemble the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub object_store: ObjectStoreConfig,
    pub document_store: DocumentStoreConfig,
    pub scorer: ScorerConfig,
    /// Overrides the built-in extension table when present.
    pub media_kinds: Option<MediaKindTable>,
    pub default_radius: Distance,
    /// Default lower bound of `/cluster`.
    pub threshold: f64,
    /// Cap on hits fetched per search.
    pub search_limit: usize,
    /// Deadline for each adapter call.
    pub step_timeout_secs: u64,
    pub compensation: CompensationPolicy,
    pub max_upload_bytes: usize,
    pub auth: AuthConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            object_store: ObjectStoreConfig::default(),
            document_store: DocumentStoreConfig::default(),
            scorer: ScorerConfig::default(),
            media_kinds: None,
            default_radius: Distance::default(),
            threshold: DEFAULT_THRESHOLD,
            search_limit: DEFAULT_SEARCH_LIMIT,
            step_timeout_secs: 30,
            compensation: CompensationPolicy::default(),
            max_upload_bytes: 32 * 1024 * 1024,
            auth: AuthConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            NearbyError::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&content)
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = serde_json::from_str(content)
            .map_err(|e| NearbyError::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(NearbyError::config("threshold must be a number"));
        }
        if self.search_limit == 0 {
            return Err(NearbyError::config("search_limit must be positive"));
        }
        if self.step_timeout_secs == 0 {
            return Err(NearbyError::config("step_timeout_secs must be positive"));
        }
        if self.max_upload_bytes == 0 {
            return Err(NearbyError::config("max_upload_bytes must be positive"));
        }
        if self.auth.signing_key.as_deref() == Some("") {
            return Err(NearbyError::config("auth.signing_key is empty"));
        }
        if let (ScorerConfig::Http(_), ObjectStoreConfig::File(file)) = (&self.scorer, &self.object_store) {
            if file.remote_base_url().is_none() {
                return Err(NearbyError::config(
                    "the http scorer cannot read file:// media; set object_store.fetch_base_url",
                ));
            }
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_secs)
    }
}
