//! Query targets, responses and per-target outcomes

use crate::error::BackendError;
use crate::types::SeriesId;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Context value routing a target to the forecast path
pub const PROGNOSIS_CONTEXT: &str = "prognosis";

/// One target of a dashboard query
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryTarget {
    /// Series identifier
    pub target: SeriesId,
    /// Grafana's reference id of the target (A, B, ...)
    #[serde(default, rename = "refId")]
    pub ref_id: Option<String>,
    /// Additional per-target options
    #[serde(default, alias = "data")]
    pub payload: TargetPayload,
}

impl QueryTarget {
    /// Create a target without options
    pub fn new(target: impl Into<SeriesId>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: TargetPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Free-form options a dashboard attaches to a target
///
/// Every field is optional; missing fields mean "not requested".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetPayload {
    /// `prognosis` selects the forecast path
    #[serde(default)]
    pub context: Option<String>,
    /// Grouping keyword (hour, day, month, ...)
    #[serde(default)]
    pub group: Option<String>,
    /// Middleware options (e.g. consumption)
    #[serde(default)]
    pub options: Option<String>,
    /// Display name overriding the cached entity title
    #[serde(default)]
    pub name: Option<String>,
    /// Forecast period (day, month, year)
    #[serde(default)]
    pub period: Option<String>,
    /// Point budget overriding the request's maxDataPoints
    #[serde(default)]
    pub tuples: Option<i64>,
}

impl TargetPayload {
    /// Whether the target asks for the forecast path
    pub fn is_prognosis(&self) -> bool {
        self.context
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(PROGNOSIS_CONTEXT))
    }

    /// Lower-cased grouping keyword, empty when absent
    pub fn group(&self) -> String {
        self.group.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Lower-cased middleware options, empty when absent
    pub fn options(&self) -> String {
        self.options.as_deref().unwrap_or_default().to_lowercase()
    }

    /// Non-empty display name override
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Non-empty forecast period
    pub fn period(&self) -> Option<&str> {
        self.period.as_deref().filter(|p| !p.is_empty())
    }
}

/// Name a response is labelled with
///
/// Serializes to a plain string; the variant records where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTarget {
    /// Title resolved through the entity cache
    Resolved(String),
    /// Name given explicitly in the target payload
    Override(String),
    /// Raw series id (no cached title)
    Raw(SeriesId),
}

impl DisplayTarget {
    /// The label as sent to the dashboard
    pub fn as_str(&self) -> &str {
        match self {
            DisplayTarget::Resolved(s) | DisplayTarget::Override(s) | DisplayTarget::Raw(s) => s,
        }
    }
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DisplayTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Datapoint in dashboard order, serialized as `[value, timestamp]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datapoint {
    /// Sample value
    pub value: f32,
    /// Milliseconds for series, seconds for forecasts
    pub timestamp: i64,
}

impl Datapoint {
    /// Create a datapoint
    pub fn new(value: f32, timestamp: i64) -> Self {
        Self { value, timestamp }
    }
}

impl Serialize for Datapoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.value)?;
        seq.serialize_element(&self.timestamp)?;
        seq.end()
    }
}

/// Result of one target
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    /// Label of the series
    pub target: DisplayTarget,
    /// Samples in backend order
    pub datapoints: Vec<Datapoint>,
}

impl QueryResponse {
    /// Empty response labelled with the raw series id
    pub fn empty(id: impl Into<SeriesId>) -> Self {
        Self {
            target: DisplayTarget::Raw(id.into()),
            datapoints: Vec::new(),
        }
    }
}

/// Why a target was answered with empty datapoints
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// Backend call failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Fan-out task panicked or was cancelled
    #[error("Query task failed: {0}")]
    TaskFailed(String),
}

/// Outcome of one target
///
/// Failures never abort a query; they degrade the affected slot to an empty
/// response and keep the cause for inspection.
#[derive(Debug)]
pub enum TargetOutcome {
    /// Backend answered (possibly with no data)
    Ok(QueryResponse),
    /// Backend failed; the response carries no datapoints
    Degraded {
        /// Empty response for the slot
        response: QueryResponse,
        /// Failure cause
        cause: TargetError,
    },
}

impl TargetOutcome {
    /// Response for the slot, whatever the outcome
    pub fn response(&self) -> &QueryResponse {
        match self {
            TargetOutcome::Ok(response) | TargetOutcome::Degraded { response, .. } => response,
        }
    }

    /// Consume into the response for the slot
    pub fn into_response(self) -> QueryResponse {
        match self {
            TargetOutcome::Ok(response) | TargetOutcome::Degraded { response, .. } => response,
        }
    }

    /// Failure cause, if degraded
    pub fn cause(&self) -> Option<&TargetError> {
        match self {
            TargetOutcome::Ok(_) => None,
            TargetOutcome::Degraded { cause, .. } => Some(cause),
        }
    }

    /// Whether the slot was degraded
    pub fn is_degraded(&self) -> bool {
        matches!(self, TargetOutcome::Degraded { .. })
    }

    pub(crate) fn response_mut(&mut self) -> &mut QueryResponse {
        match self {
            TargetOutcome::Ok(response) | TargetOutcome::Degraded { response, .. } => response,
        }
    }
}
