//! Query fan-out engine
//!
//! Executes a dashboard query by running one task per target against the
//! backend and assembling the results in target order.
//!
//! # Architecture
//!
//! ```text
//!  targets[0]   targets[1]   targets[2]
//!      │            │            │
//!      ▼            ▼            ▼
//!  ┌────────────────────────────────┐
//!  │ JoinSet (semaphore-gated)      │
//!  └────────────────────────────────┘
//!      │            │            │
//!  series path  forecast path  series path
//!      │            │            │
//!      ▼            ▼            ▼
//!  slots[0]     slots[1]     slots[2]    (written by index, once)
//! ```
//!
//! Completion order is arbitrary; each task reports its own index, so the
//! output is always aligned with the input. A failing target degrades its
//! own slot to empty datapoints and never affects its siblings.
//!
//! Dropping the future returned by [`QueryEngine::execute`] drops the
//! `JoinSet`, which aborts every in-flight target. An abandoned inbound
//! request therefore releases its backend calls immediately.

use super::bucket::round_timestamp;
use super::types::{
    Datapoint, DisplayTarget, QueryResponse, QueryTarget, TargetError, TargetOutcome,
};
use crate::backend::Backend;
use crate::entity::EntityCache;
use crate::types::TimeRange;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Configuration for the query engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of targets fetched concurrently
    /// Default: 16
    pub max_concurrent_targets: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_targets: 16,
        }
    }
}

/// Fan-out query engine
///
/// Cheap to clone; clones share the backend, the entity cache and the
/// concurrency limit.
#[derive(Clone)]
pub struct QueryEngine {
    backend: Arc<dyn Backend>,
    cache: Arc<EntityCache>,
    limiter: Arc<Semaphore>,
}

impl QueryEngine {
    /// Create an engine
    pub fn new(backend: Arc<dyn Backend>, cache: Arc<EntityCache>, config: EngineConfig) -> Self {
        Self {
            backend,
            cache,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_targets.max(1))),
        }
    }

    /// Backend the engine queries
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Entity cache used for display names
    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    /// Run every target and return the responses in target order
    pub async fn execute_query(
        &self,
        targets: Vec<QueryTarget>,
        range: TimeRange,
        max_data_points: usize,
    ) -> Vec<QueryResponse> {
        self.execute(targets, range, max_data_points)
            .await
            .into_iter()
            .map(TargetOutcome::into_response)
            .collect()
    }

    /// Run every target and return the per-target outcomes in target order
    pub async fn execute(
        &self,
        targets: Vec<QueryTarget>,
        range: TimeRange,
        max_data_points: usize,
    ) -> Vec<TargetOutcome> {
        let labels: Vec<(String, Option<String>)> = targets
            .iter()
            .map(|t| (t.target.clone(), t.payload.name().map(str::to_string)))
            .collect();
        let mut slots: Vec<Option<TargetOutcome>> = Vec::with_capacity(targets.len());
        slots.resize_with(targets.len(), || None);

        debug!(targets = targets.len(), "Executing query");

        let mut join_set = JoinSet::new();
        for (idx, target) in targets.into_iter().enumerate() {
            let engine = self.clone();
            let permit = Arc::clone(&self.limiter);

            join_set.spawn(async move {
                // Acquire semaphore permit to limit concurrency
                let _permit = permit.acquire().await;
                (idx, engine.run_target(target, range, max_data_points).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "Query task failed"),
            }
        }

        slots
            .into_iter()
            .zip(labels)
            .map(|(slot, (id, name))| {
                slot.unwrap_or_else(|| TargetOutcome::Degraded {
                    response: QueryResponse {
                        target: self.display_target(&id, name.as_deref()),
                        datapoints: Vec::new(),
                    },
                    cause: TargetError::TaskFailed(format!("no result for target {}", id)),
                })
            })
            .collect()
    }

    /// Route one target and label its response
    async fn run_target(
        &self,
        target: QueryTarget,
        range: TimeRange,
        max_data_points: usize,
    ) -> TargetOutcome {
        let mut outcome = if target.payload.is_prognosis() {
            self.query_forecast(&target).await
        } else {
            self.query_series(&target, range, max_data_points).await
        };

        if let Some(cause) = outcome.cause() {
            warn!(series = %target.target, error = %cause, "Target degraded to empty result");
        }

        outcome.response_mut().target = self.display_target(&target.target, target.payload.name());
        outcome
    }

    /// Series path: fetch samples and round timestamps to the requested group
    async fn query_series(
        &self,
        target: &QueryTarget,
        range: TimeRange,
        max_data_points: usize,
    ) -> TargetOutcome {
        let group = target.payload.group();
        let options = target.payload.options();
        let max_points = match target.payload.tuples {
            Some(tuples) if tuples > 0 => tuples as usize,
            _ => max_data_points,
        };

        let tuples = match self
            .backend
            .fetch_series(
                &target.target,
                range.from_secs(),
                range.to_secs(),
                &group,
                &options,
                max_points,
            )
            .await
        {
            Ok(tuples) => tuples,
            Err(e) => return degraded(&target.target, e.into()),
        };

        let datapoints = tuples
            .into_iter()
            .map(|tuple| {
                let timestamp = if group.is_empty() {
                    tuple.timestamp
                } else {
                    round_timestamp(tuple.timestamp, &group)
                };
                Datapoint::new(tuple.value, timestamp)
            })
            .collect();

        TargetOutcome::Ok(QueryResponse {
            target: DisplayTarget::Raw(target.target.clone()),
            datapoints,
        })
    }

    /// Forecast path: a single datapoint stamped with the current time
    ///
    /// The timestamp is in Unix seconds, not milliseconds.
    async fn query_forecast(&self, target: &QueryTarget) -> TargetOutcome {
        let period = match target.payload.period() {
            Some(period) => period,
            None => return TargetOutcome::Ok(QueryResponse::empty(target.target.clone())),
        };

        match self.backend.fetch_forecast(&target.target, period).await {
            Ok(consumption) => TargetOutcome::Ok(QueryResponse {
                target: DisplayTarget::Raw(target.target.clone()),
                datapoints: vec![Datapoint::new(consumption, Utc::now().timestamp())],
            }),
            Err(e) => degraded(&target.target, e.into()),
        }
    }

    /// Explicit name, then cached title, then the raw id
    fn display_target(&self, id: &str, name: Option<&str>) -> DisplayTarget {
        if let Some(name) = name {
            return DisplayTarget::Override(name.to_string());
        }
        match self.cache.lookup(id) {
            Some(title) => DisplayTarget::Resolved(title),
            None => DisplayTarget::Raw(id.to_string()),
        }
    }
}

fn degraded(id: &str, cause: TargetError) -> TargetOutcome {
    TargetOutcome::Degraded {
        response: QueryResponse::empty(id),
        cause,
    }
}
