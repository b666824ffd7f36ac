//! HTTP handlers for the Grafana SimpleJson endpoints
//!
//! Request bodies are decoded here rather than through axum's `Json`
//! extractor so that a missing `Content-Type` header is accepted and every
//! decoding failure is reported the same way.

use super::types::*;
use super::AppState;
use crate::query::QueryResponse;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

// =============================================================================
// Errors
// =============================================================================

/// Error surfaced to the dashboard
#[derive(Debug)]
pub enum ApiError {
    /// Request body is not valid JSON for the endpoint
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
        }
    }
}

/// Decode a JSON request body
fn decode<T: DeserializeOwned>(state: &AppState, body: &Bytes) -> Result<T, ApiError> {
    if state.verbose {
        debug!(body = %String::from_utf8_lossy(body), "Request body");
    }

    serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "json decode failed");
        ApiError::BadRequest(format!("json decode failed: {}", e))
    })
}

/// Wrap a response, logging it when verbose
fn respond<T: Serialize>(state: &AppState, resp: T) -> Json<T> {
    if state.verbose {
        match serde_json::to_string(&resp) {
            Ok(json) => debug!(body = %json, "Response body"),
            Err(e) => warn!(error = %e, "json encode failed"),
        }
    }
    Json(resp)
}

// =============================================================================
// Health Handlers
// =============================================================================

/// Datasource connectivity test
pub async fn root() -> &'static str {
    "ok\n"
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        cached_entities: state.engine.cache().len(),
    })
}

// =============================================================================
// Search and Query Handlers
// =============================================================================

/// Metric picker: refresh the entity cache and list every series
pub async fn search(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Vec<SearchResponse>>, ApiError> {
    let req: SearchRequest = decode(&state, &body)?;
    let resp = state.handle_search(&req).await;
    Ok(respond(&state, resp))
}

/// Panel data: run every target of the query
pub async fn query(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Vec<QueryResponse>>, ApiError> {
    let req: QueryRequest = decode(&state, &body)?;
    let resp = state.handle_query(req).await;
    Ok(respond(&state, resp))
}

// =============================================================================
// Annotation and Tag Handlers
// =============================================================================

/// Annotations are not supported; the request is validated and answered empty
pub async fn annotations(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Vec<AnnotationResponse>>, ApiError> {
    let _req: AnnotationsRequest = decode(&state, &body)?;
    Ok(respond(&state, Vec::new()))
}

/// Ad hoc filter keys
pub async fn tag_keys(State(state): State<Arc<AppState>>) -> Json<Vec<TagKeyResponse>> {
    respond(
        &state,
        vec![TagKeyResponse {
            kind: "string",
            text: "group",
        }],
    )
}

/// Ad hoc filter values
pub async fn tag_values(State(state): State<Arc<AppState>>) -> Json<Vec<TagValueResponse>> {
    respond(
        &state,
        vec![
            TagValueResponse { text: "Current" },
            TagValueResponse {
                text: "Consumption",
            },
        ],
    )
}
