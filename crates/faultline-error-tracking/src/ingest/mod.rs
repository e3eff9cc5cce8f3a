//! SDK-facing ingest endpoints.
//!
//! `POST /api/{project_id}/envelope` takes the newline-delimited envelope;
//! `POST /api/{project_id}/store` takes the legacy single-event JSON. Both
//! authenticate with the project public key and swallow per-event failures:
//! one broken event never rejects its siblings.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use faultline_core::error::{error_response, internal_error_response, kind};
use faultline_projects::{ProjectRegistry, RegistryError};

use crate::protocol::{
    decompress_body, extract_events, extract_public_key, fill_event_defaults,
    is_single_event_body, Envelope, EnvelopeError,
};
use crate::services::IngestionService;

#[derive(OpenApi)]
#[openapi(
    paths(ingest_envelope, ingest_store),
    components(schemas(IngestResponse)),
    tags(
        (name = "ingest", description = "Sentry-compatible SDK ingest endpoints")
    )
)]
pub struct IngestApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn ProjectRegistry>,
    pub ingestion: Arc<IngestionService>,
    /// Bodies over this size are rejected with 413 before parsing.
    pub max_body_bytes: usize,
}

pub fn configure_routes() -> Router<Arc<AppState>> {
    // SDKs post cross-origin straight from browsers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/{project_id}/envelope", post(ingest_envelope))
        .route("/{project_id}/envelope/", post(ingest_envelope))
        .route("/{project_id}/store", post(ingest_store))
        .route("/{project_id}/store/", post(ingest_store))
        .layer(cors)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IngestResponse {
    /// First successfully ingested event id, the first incoming id when
    /// every ingest failed, or null for an empty envelope.
    pub id: Option<String>,
}

#[derive(Debug)]
enum IngestError {
    MissingAuth,
    InvalidAuth,
    ProjectMismatch,
    ParseFailed(String),
    DecompressionFailed(String),
    BodyTooLarge,
    Internal,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::MissingAuth => error_response(
                StatusCode::UNAUTHORIZED,
                kind::MISSING_AUTH,
                "missing public key",
            ),
            IngestError::InvalidAuth => error_response(
                StatusCode::UNAUTHORIZED,
                kind::INVALID_AUTH,
                "unknown public key",
            ),
            IngestError::ProjectMismatch => error_response(
                StatusCode::BAD_REQUEST,
                kind::PROJECT_MISMATCH,
                "public key does not belong to this project",
            ),
            IngestError::ParseFailed(message) => {
                error_response(StatusCode::BAD_REQUEST, kind::PARSE_FAILED, &message)
            }
            IngestError::DecompressionFailed(message) => error_response(
                StatusCode::BAD_REQUEST,
                kind::DECOMPRESSION_FAILED,
                &message,
            ),
            IngestError::BodyTooLarge => error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                kind::PARSE_FAILED,
                "request body too large",
            ),
            IngestError::Internal => internal_error_response(),
        }
    }
}

impl From<RegistryError> for IngestError {
    fn from(err: RegistryError) -> Self {
        tracing::error!(error = %err, "registry lookup failed during ingest");
        IngestError::Internal
    }
}

/// Authenticate the request and resolve the owning project id.
async fn authenticate(
    state: &AppState,
    url_project_id: &str,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<String, IngestError> {
    let query_key = params.get("sentry_key").map(String::as_str);
    let sentry_auth = headers
        .get("x-sentry-auth")
        .and_then(|v| v.to_str().ok());
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    let public_key = extract_public_key(query_key, sentry_auth, authorization)
        .ok_or(IngestError::MissingAuth)?;

    let project = state
        .registry
        .get_project_by_key(&public_key)
        .await?
        .ok_or(IngestError::InvalidAuth)?;

    if project.id != url_project_id {
        return Err(IngestError::ProjectMismatch);
    }

    Ok(project.id)
}

fn decode_body(headers: &HeaderMap, body: &Bytes) -> Result<Vec<u8>, IngestError> {
    let content_encoding = headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok());

    decompress_body(content_encoding, body).map_err(|e| match e {
        EnvelopeError::Decompression(message) => IngestError::DecompressionFailed(message),
        other => IngestError::ParseFailed(other.to_string()),
    })
}

/// Ingest events in envelope order; a failure on one event never skips the
/// next. Returns the first successful event id, falling back to the first
/// incoming id.
async fn ingest_all(state: &AppState, project_id: &str, events: Vec<Value>) -> Option<String> {
    let first_incoming = events
        .first()
        .and_then(|e| e.get("event_id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let mut first_success = None;
    for event in events {
        match state.ingestion.ingest(project_id, event).await {
            Ok(outcome) => {
                if first_success.is_none() {
                    first_success = Some(outcome.event_id);
                }
            }
            Err(err) => {
                tracing::error!(project_id, error = %err, "ingest failed");
            }
        }
    }

    first_success.or(first_incoming)
}

/// Ingest a Sentry envelope
#[utoipa::path(
    post,
    path = "/api/{project_id}/envelope",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body(content = String, description = "Newline-delimited Sentry envelope", content_type = "application/x-sentry-envelope"),
    responses(
        (status = 200, description = "Envelope accepted", body = IngestResponse),
        (status = 400, description = "Parse, decompression or project mismatch failure"),
        (status = 401, description = "Missing or invalid auth"),
        (status = 413, description = "Body too large"),
    ),
    tag = "ingest"
)]
async fn ingest_envelope(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    if body.len() > state.max_body_bytes {
        return Err(IngestError::BodyTooLarge);
    }

    let project_id = authenticate(&state, &project_id, &params, &headers).await?;
    let decoded = decode_body(&headers, &body)?;

    let content_type = headers.get("content-type").and_then(|v| v.to_str().ok());
    let events = if is_single_event_body(content_type, &decoded) {
        // SDKs that predate envelopes post one JSON event
        match serde_json::from_slice::<Value>(&decoded) {
            Ok(event @ Value::Object(_)) => vec![fill_event_defaults(event)],
            _ => {
                return Err(IngestError::ParseFailed(
                    "event must be a JSON object".to_string(),
                ))
            }
        }
    } else {
        match Envelope::from_slice(&decoded) {
            Ok(envelope) => extract_events(envelope),
            // Tolerate a bare JSON event even without the JSON content type
            Err(header_err) => match serde_json::from_slice::<Value>(&decoded) {
                Ok(event @ Value::Object(_)) => vec![fill_event_defaults(event)],
                _ => return Err(IngestError::ParseFailed(header_err.to_string())),
            },
        }
    };

    let id = ingest_all(&state, &project_id, events).await;
    Ok(Json(IngestResponse { id }))
}

/// Ingest a single legacy-store event
#[utoipa::path(
    post,
    path = "/api/{project_id}/store",
    params(("project_id" = String, Path, description = "Project ID")),
    request_body(content = String, description = "One JSON event", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted", body = IngestResponse),
        (status = 400, description = "Parse, decompression or project mismatch failure"),
        (status = 401, description = "Missing or invalid auth"),
        (status = 413, description = "Body too large"),
    ),
    tag = "ingest"
)]
async fn ingest_store(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestResponse>, IngestError> {
    if body.len() > state.max_body_bytes {
        return Err(IngestError::BodyTooLarge);
    }

    let project_id = authenticate(&state, &project_id, &params, &headers).await?;
    let decoded = decode_body(&headers, &body)?;

    let event: Value = serde_json::from_slice(&decoded)
        .map_err(|e| IngestError::ParseFailed(e.to_string()))?;
    if !event.is_object() {
        return Err(IngestError::ParseFailed(
            "event must be a JSON object".to_string(),
        ));
    }

    let id = ingest_all(&state, &project_id, vec![fill_event_defaults(event)]).await;
    Ok(Json(IngestResponse { id }))
}
