//! Shared test doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use vz_grafana::{Backend, BackendError, EntityTree, Tuple};

/// Arguments of a recorded `fetch_series` call
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesCall {
    pub id: String,
    pub from: i64,
    pub to: i64,
    pub group: String,
    pub options: String,
    pub max_points: usize,
}

/// Scripted in-memory backend
///
/// Series and forecasts are answered from maps; ids listed in `failing`
/// return an API exception. Per-id delays simulate slow channels.
pub struct FakeBackend {
    pub entities: parking_lot::Mutex<Result<Vec<EntityTree>, String>>,
    pub series: HashMap<String, Vec<Tuple>>,
    pub forecasts: HashMap<String, f32>,
    pub failing: Vec<String>,
    pub delays: HashMap<String, Duration>,
    pub series_calls: parking_lot::Mutex<Vec<SeriesCall>>,
    pub forecast_calls: AtomicUsize,
    pub entity_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub completed: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            entities: parking_lot::Mutex::new(Ok(Vec::new())),
            series: HashMap::new(),
            forecasts: HashMap::new(),
            failing: Vec::new(),
            delays: HashMap::new(),
            series_calls: parking_lot::Mutex::new(Vec::new()),
            forecast_calls: AtomicUsize::new(0),
            entity_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn with_series(mut self, id: &str, tuples: Vec<Tuple>) -> Self {
        self.series.insert(id.to_string(), tuples);
        self
    }

    pub fn with_forecast(mut self, id: &str, consumption: f32) -> Self {
        self.forecasts.insert(id.to_string(), consumption);
        self
    }

    pub fn with_failure(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }

    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn with_entities(self, roots: Vec<EntityTree>) -> Self {
        *self.entities.lock() = Ok(roots);
        self
    }

    pub fn set_entities(&self, entities: Result<Vec<EntityTree>, String>) {
        *self.entities.lock() = entities;
    }

    pub fn series_calls(&self) -> Vec<SeriesCall> {
        self.series_calls.lock().clone()
    }

    async fn enter(&self, id: &str) -> Result<(), BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(id) {
            tokio::time::sleep(*delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|f| f == id) {
            return Err(BackendError::Api(format!("channel {} unavailable", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_entities(&self) -> Result<Vec<EntityTree>, BackendError> {
        self.entity_calls.fetch_add(1, Ordering::SeqCst);
        self.entities.lock().clone().map_err(BackendError::Api)
    }

    async fn fetch_series(
        &self,
        id: &str,
        from: i64,
        to: i64,
        group: &str,
        options: &str,
        max_points: usize,
    ) -> Result<Vec<Tuple>, BackendError> {
        self.series_calls.lock().push(SeriesCall {
            id: id.to_string(),
            from,
            to,
            group: group.to_string(),
            options: options.to_string(),
            max_points,
        });
        self.enter(id).await?;
        Ok(self.series.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_forecast(&self, id: &str, _period: &str) -> Result<f32, BackendError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.enter(id).await?;
        self.forecasts
            .get(id)
            .copied()
            .ok_or_else(|| BackendError::Api("no prognosis".to_string()))
    }
}
