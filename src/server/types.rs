//! Request and response types of the Grafana SimpleJson datasource API
//!
//! See <https://github.com/grafana/simple-json-datasource> for the protocol.

use crate::query::QueryTarget;
use crate::types::TimeRange;
use serde::{Deserialize, Serialize};

// =============================================================================
// Query API Types
// =============================================================================

/// Body of `POST /query`
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// Panel issuing the query
    #[serde(default, rename = "panelId")]
    pub panel_id: Option<i64>,
    /// Absolute time range
    pub range: TimeRange,
    /// Suggested interval, e.g. `30s`
    #[serde(default)]
    pub interval: Option<String>,
    /// Suggested interval in milliseconds
    #[serde(default, rename = "intervalMs")]
    pub interval_ms: Option<i64>,
    /// Targets to query
    #[serde(default)]
    pub targets: Vec<QueryTarget>,
    /// Maximum number of points the panel can render
    #[serde(default, rename = "maxDataPoints")]
    pub max_data_points: usize,
}

// =============================================================================
// Search API Types
// =============================================================================

/// Body of `POST /search`
#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    /// Text typed into the metric picker
    #[serde(default)]
    pub target: String,
}

/// One entry of the metric picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Display title
    pub text: String,
    /// Series id
    pub value: String,
}

// =============================================================================
// Annotation and Tag Types
// =============================================================================

/// Body of `POST /annotations`
#[derive(Debug, Deserialize)]
pub struct AnnotationsRequest {
    /// Absolute time range
    pub range: TimeRange,
    /// Annotation definition
    #[serde(default)]
    pub annotation: Annotation,
}

/// Annotation definition sent by Grafana
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Annotation {
    /// Name, echoed back in responses
    #[serde(default)]
    pub name: String,
    /// Datasource name
    #[serde(default)]
    pub datasource: String,
    /// Marker colour
    #[serde(default, rename = "iconColor")]
    pub icon_color: String,
    /// Whether the annotation is enabled
    #[serde(default)]
    pub enable: bool,
    /// Annotation query text
    #[serde(default)]
    pub query: String,
}

/// Annotation event
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationResponse {
    /// The annotation from the request
    pub annotation: Annotation,
    /// Unix time in milliseconds
    pub time: i64,
    /// Tooltip title
    pub title: String,
    /// Tags
    pub tags: String,
    /// Tooltip text
    pub text: String,
}

/// Ad hoc filter key
#[derive(Debug, Clone, Serialize)]
pub struct TagKeyResponse {
    /// Key type
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Key name
    pub text: &'static str,
}

/// Ad hoc filter value
#[derive(Debug, Clone, Serialize)]
pub struct TagValueResponse {
    /// Value
    pub text: &'static str,
}

// =============================================================================
// Health Types
// =============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Number of cached entity titles
    pub cached_entities: usize,
}
