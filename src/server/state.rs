//! Shared state handed to every request.

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::users::UserDirectory;
use crate::auth::{SessionVerifier, TokenAuthority};
use crate::blob::{ObjectStoreConfig, ObjectStoreFactory};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::ingest::IngestPipeline;
use crate::scoring::ScorerFactory;
use crate::search::SearchEngine;
use crate::store::{DocumentStore, DocumentStoreFactory};

/// Default request body cap for uploads.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// The assembled service. Cheap to clone; every component is shared.
#[derive(Debug, Clone)]
pub struct AppState {
    pub documents: Arc<dyn DocumentStore>,
    pub pipeline: IngestPipeline,
    pub search: SearchEngine,
    pub users: UserDirectory,
    pub tokens: Arc<TokenAuthority>,
    pub verifier: Arc<dyn SessionVerifier>,
    /// Directory served under `/media` when media lives on local disk.
    pub media_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        pipeline: IngestPipeline,
        search: SearchEngine,
        users: UserDirectory,
        tokens: Arc<TokenAuthority>,
    ) -> Self {
        AppState {
            documents,
            pipeline,
            search,
            users,
            verifier: tokens.clone(),
            tokens,
            media_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_media_dir(mut self, media_dir: PathBuf) -> Self {
        self.media_dir = Some(media_dir);
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Build every adapter named in the configuration and wire them up.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        let step_timeout = config.step_timeout();

        let objects = ObjectStoreFactory::create(config.object_store.clone())?;
        let documents = DocumentStoreFactory::create(config.document_store.clone())?;
        let scorer = ScorerFactory::create(config.scorer.clone())?;

        let pipeline = IngestPipeline::new(objects, scorer, documents.clone())
            .with_media_kinds(config.media_kinds.clone().unwrap_or_default())
            .with_compensation(config.compensation)
            .with_step_timeout(step_timeout);

        let search = SearchEngine::new(documents.clone())
            .with_default_radius(config.default_radius)
            .with_default_threshold(config.threshold)
            .with_limit(config.search_limit)
            .with_step_timeout(step_timeout);

        let users = UserDirectory::new(documents.clone())?.with_step_timeout(step_timeout);

        let secret = match &config.auth.signing_key {
            Some(key) => key.clone(),
            None => {
                tracing::warn!(
                    "no signing key configured; using an ephemeral key, issued tokens will not survive a restart"
                );
                TokenAuthority::generate_secret()
            }
        };
        let tokens = Arc::new(TokenAuthority::new(secret.as_bytes()).with_ttl(config.token_ttl()));

        let mut state = AppState::new(documents, pipeline, search, users, tokens)
            .with_max_upload_bytes(config.max_upload_bytes);
        if let ObjectStoreConfig::File(file_config) = &config.object_store {
            state = state.with_media_dir(file_config.directory.clone());
        }
        Ok(state)
    }
}
