//! Error types for the nearby service.
//!
//! All fallible operations return [`Result`], whose error is the
//! [`NearbyError`] enum. Every variant belongs to one [`ErrorKind`], which is
//! what the HTTP layer uses to choose a status code.
//!
//! # Examples
//!
//! ```
//! use nearby::error::{ErrorKind, NearbyError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(NearbyError::invalid_input("lat is missing"))
//! }
//!
//! let err = example_operation().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Input);
//! ```

use std::io;

use thiserror::Error;

/// The main error type for nearby operations.
#[derive(Error, Debug)]
pub enum NearbyError {
    /// I/O errors (file operations, sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or missing client input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing, expired or forged credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Object store failures
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Scoring adapter failures
    #[error("Scoring error: {0}")]
    Scoring(String),

    /// Document store failures
    #[error("Document store error: {0}")]
    DocumentStore(String),

    /// Query rejected by the document store
    #[error("Query error: {0}")]
    Query(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An adapter call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport errors talking to remote stores or the scorer
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token signing or verification errors
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Coarse classification of a [`NearbyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable; resubmitting a fixed request helps.
    Input,
    /// The caller is not authenticated.
    Auth,
    /// A store or the scorer failed; not retried by this service.
    Dependency,
    /// A bug or misconfiguration on our side.
    Internal,
}

/// Result type alias for operations that may fail with NearbyError.
pub type Result<T> = std::result::Result<T, NearbyError>;

impl NearbyError {
    /// Create a new invalid input error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        NearbyError::InvalidInput(msg.into())
    }

    /// Create a new unauthorized error.
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        NearbyError::Unauthorized(msg.into())
    }

    /// Create a new object store error.
    pub fn object_store<S: Into<String>>(msg: S) -> Self {
        NearbyError::ObjectStore(msg.into())
    }

    /// Create a new scoring error.
    pub fn scoring<S: Into<String>>(msg: S) -> Self {
        NearbyError::Scoring(msg.into())
    }

    /// Create a new document store error.
    pub fn document_store<S: Into<String>>(msg: S) -> Self {
        NearbyError::DocumentStore(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        NearbyError::Query(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        NearbyError::Config(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        NearbyError::Timeout(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        NearbyError::Other(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NearbyError::InvalidInput(_) => ErrorKind::Input,
            NearbyError::Unauthorized(_) | NearbyError::Token(_) => ErrorKind::Auth,
            NearbyError::Io(_)
            | NearbyError::ObjectStore(_)
            | NearbyError::Scoring(_)
            | NearbyError::DocumentStore(_)
            | NearbyError::Query(_)
            | NearbyError::Timeout(_)
            | NearbyError::Http(_) => ErrorKind::Dependency,
            NearbyError::Config(_) | NearbyError::Json(_) | NearbyError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = NearbyError::object_store("bucket missing");
        assert_eq!(error.to_string(), "Object store error: bucket missing");

        let error = NearbyError::scoring("upstream 503");
        assert_eq!(error.to_string(), "Scoring error: upstream 503");

        let error = NearbyError::document_store("index closed");
        assert_eq!(error.to_string(), "Document store error: index closed");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(NearbyError::invalid_input("x").kind(), ErrorKind::Input);
        assert_eq!(NearbyError::unauthorized("x").kind(), ErrorKind::Auth);
        assert_eq!(NearbyError::object_store("x").kind(), ErrorKind::Dependency);
        assert_eq!(NearbyError::scoring("x").kind(), ErrorKind::Dependency);
        assert_eq!(NearbyError::document_store("x").kind(), ErrorKind::Dependency);
        assert_eq!(NearbyError::timeout("x").kind(), ErrorKind::Dependency);
        assert_eq!(NearbyError::config("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let nearby_error = NearbyError::from(io_error);

        match nearby_error {
            NearbyError::Io(_) => {}
            _ => panic!("Expected IO error variant"),
        }
    }
}
