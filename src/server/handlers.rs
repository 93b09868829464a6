//! Route handlers.

use axum::Json;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::auth::users::NewUser;
use crate::geo::Distance;
use crate::ingest::{IngestRequest, MediaUpload, parse_coordinate};
use crate::record::Record;
use crate::server::error::ApiError;
use crate::server::extract::AuthSession;
use crate::server::state::AppState;

/// Multipart part carrying the uploaded file.
const MEDIA_PART: &str = "image";

fn bad_multipart(error: MultipartError) -> ApiError {
    ApiError::bad_request(format!("invalid multipart body: {error}"))
}

async fn read_text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(bad_multipart)
}

/// `POST /post`: multipart `lat`, `lon`, `message` and an optional `image`.
pub async fn create_post(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<StatusCode, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut lat = String::new();
    let mut lon = String::new();
    let mut message = String::new();
    let mut media = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "lat" => lat = read_text(field).await?,
            "lon" => lon = read_text(field).await?,
            "message" => message = read_text(field).await?,
            MEDIA_PART => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable media: {e}")))?;
                // A file input left empty still sends an empty, nameless part.
                if !(filename.is_empty() && bytes.is_empty()) {
                    media = Some(MediaUpload::new(filename, bytes));
                }
            }
            other => tracing::debug!(part = other, "ignoring unknown multipart part"),
        }
    }

    tracing::info!(author = %session.username, has_media = media.is_some(), "post received");
    state
        .pipeline
        .ingest(IngestRequest {
            author: session.username,
            message,
            lat: parse_coordinate(&lat),
            lon: parse_coordinate(&lon),
            media,
        })
        .await?;

    Ok(StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    /// Radius in kilometers, as a plain number.
    pub range: Option<String>,
}

/// The HTTP `range` is always kilometers; unit suffixes are rejected.
fn parse_radius_km(raw: &str) -> Result<Distance, ApiError> {
    let km = raw
        .parse::<f64>()
        .map_err(|_| ApiError::bad_request(format!("range '{raw}' is not a number of kilometers")))?;
    Ok(Distance::kilometers(km)?)
}

/// `GET /search?lat=&lon=&range=`
pub async fn search(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let lat = parse_coordinate(params.lat.as_deref().unwrap_or_default());
    let lon = parse_coordinate(params.lon.as_deref().unwrap_or_default());
    let radius = params
        .range
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(parse_radius_km)
        .transpose()?;

    tracing::info!(user = %session.username, lat, lon, ?radius, "search received");
    let records = state.search.search_by_radius(lat, lon, radius).await?;
    Ok(Json(records))
}

#[derive(Debug, Default, Deserialize)]
pub struct ClusterParams {
    pub term: Option<String>,
    pub min: Option<String>,
}

/// `GET /cluster?term=&min=`
pub async fn cluster(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Query(params): Query<ClusterParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    // Field names are matched exactly, surrounding whitespace included.
    let term = params
        .term
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("term is required"))?;
    let min = params
        .min
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            m.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| ApiError::bad_request(format!("min '{m}' is not a number")))
        })
        .transpose()?;

    tracing::info!(user = %session.username, term, ?min, "cluster received");
    let records = state.search.search_by_threshold(term, min).await?;
    Ok(Json(records))
}

/// `POST /signup` with a JSON account.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(user) = payload
        .map_err(|e| ApiError::bad_request(format!("Cannot decode user data: {}", e.body_text())))?;

    if state.users.register(user).await? {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::bad_request("User already exists"))
    }
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// `POST /login`: answers with the token as plain text.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(credentials) = payload
        .map_err(|e| ApiError::bad_request(format!("Cannot decode user data: {}", e.body_text())))?;

    if !state
        .users
        .check_credentials(&credentials.username, &credentials.password)
        .await?
    {
        return Err(ApiError::unauthorized("User doesn't exist or wrong password"));
    }

    let token = state.tokens.issue(&credentials.username)?;
    tracing::info!(username = %credentials.username, "token issued");
    Ok(token)
}

/// `GET /healthz`
pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
