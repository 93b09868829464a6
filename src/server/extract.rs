//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::{Session, bearer_token};
use crate::server::error::ApiError;
use crate::server::state::AppState;

/// The verified caller of a protected route.
///
/// Rejects with 401 when the `Authorization` header is missing, is not a
/// bearer token, or the token does not verify.
#[derive(Debug, Clone)]
pub struct AuthSession(pub Session);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

        let session = state.verifier.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "token rejected");
            ApiError::unauthorized("invalid token")
        })?;
        Ok(AuthSession(session))
    }
}
