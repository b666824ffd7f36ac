//! HTTP server for the Grafana SimpleJson datasource
//!
//! # Endpoints
//!
//! - `GET|POST /` - Datasource connectivity test
//! - `POST /search` - List series for the metric picker
//! - `POST /query` - Panel data
//! - `POST /annotations` - Annotations (always empty)
//! - `POST /tag-keys`, `POST /tag-values` - Ad hoc filter options
//! - `GET /health` - Health check

mod handlers;
mod types;

pub use handlers::ApiError;
pub use types::*;

use crate::query::{QueryEngine, QueryResponse};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
pub struct AppState {
    /// Query engine (owns the backend and the entity cache)
    pub engine: QueryEngine,
    /// Log request and response bodies
    pub verbose: bool,
}

impl AppState {
    /// Create the application state
    pub fn new(engine: QueryEngine, verbose: bool) -> Self {
        Self { engine, verbose }
    }

    /// Refresh the entity cache and list every series
    ///
    /// A backend failure yields an empty list; the cache keeps its titles.
    pub async fn handle_search(&self, _req: &SearchRequest) -> Vec<SearchResponse> {
        self.engine
            .cache()
            .refresh(self.engine.backend().as_ref())
            .await
            .into_iter()
            .map(|entity| SearchResponse {
                text: entity.display_title,
                value: entity.id,
            })
            .collect()
    }

    /// Run every target of a query, in target order
    pub async fn handle_query(&self, req: QueryRequest) -> Vec<QueryResponse> {
        self.engine
            .execute_query(req.targets, req.range, req.max_data_points)
            .await
    }
}

/// Build CORS layer from configuration
fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE]);

    if cors_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(origins)
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root).post(handlers::root))
        .route("/health", get(handlers::health))
        .route("/search", post(handlers::search))
        .route("/query", post(handlers::query))
        .route("/annotations", post(handlers::annotations))
        .route("/tag-keys", post(handlers::tag_keys))
        .route("/tag-values", post(handlers::tag_values))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
}
