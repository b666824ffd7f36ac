//! Query engine for dashboard requests
//!
//! Translates the targets of a Grafana query into backend calls, runs them
//! concurrently and reshapes the results into dashboard datapoints.

mod bucket;
mod engine;
mod types;

pub use bucket::{infer_bucket, round_timestamp, round_timestamp_in, Bucket};
pub use engine::{EngineConfig, QueryEngine};
pub use types::{
    Datapoint, DisplayTarget, QueryResponse, QueryTarget, TargetError, TargetOutcome,
    TargetPayload, PROGNOSIS_CONTEXT,
};
