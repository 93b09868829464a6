//! Mapping of errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::{ErrorKind, NearbyError};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// An error response with a JSON body `{"error": "..."}`.
///
/// Only input errors echo their detail back; dependency and internal
/// failures are logged and answered with a generic message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<NearbyError> for ApiError {
    fn from(error: NearbyError) -> Self {
        match error.kind() {
            ErrorKind::Input => {
                tracing::debug!(error = %error, "rejected request");
                ApiError::bad_request(error.to_string())
            }
            ErrorKind::Auth => {
                tracing::debug!(error = %error, "authentication failed");
                ApiError::unauthorized("unauthorized")
            }
            ErrorKind::Dependency => {
                tracing::error!(error = %error, "dependency failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "storage or scoring failure")
            }
            ErrorKind::Internal => {
                tracing::error!(error = %error, "internal failure");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
