//! Query Engine Integration Tests
//!
//! Drives the fan-out engine against a scripted in-memory backend.
//!
//! # Test Coverage
//!
//! 1. **Ordering** - Responses follow target order regardless of completion order
//! 2. **Partial Failure** - A failing target is empty, its siblings are untouched
//! 3. **Forecast Path** - Period handling and second-resolution timestamps
//! 4. **Display Names** - Override, cached title, raw id
//! 5. **Series Options** - Grouping, rounding, point budget
//! 6. **Concurrency** - Limit on in-flight targets, cancellation on drop
//! 7. **Entity Cache** - Refresh through the backend

mod common;

use chrono::{DateTime, Utc};
use common::FakeBackend;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use vz_grafana::query::{
    round_timestamp, DisplayTarget, EngineConfig, QueryEngine, QueryTarget, TargetError,
    TargetPayload,
};
use vz_grafana::{EntityCache, EntityTree, FlatEntity, TimeRange, Tuple};

// =============================================================================
// Helpers
// =============================================================================

const FROM_SECS: i64 = 1_700_000_000;
const TO_SECS: i64 = 1_700_086_400;

fn range() -> TimeRange {
    TimeRange::new(
        DateTime::from_timestamp(FROM_SECS, 0).unwrap(),
        DateTime::from_timestamp(TO_SECS, 0).unwrap(),
    )
}

fn engine_with(
    backend: FakeBackend,
    limit: usize,
) -> (QueryEngine, Arc<FakeBackend>, Arc<EntityCache>) {
    let backend = Arc::new(backend);
    let cache = Arc::new(EntityCache::new());
    let engine = QueryEngine::new(
        backend.clone(),
        cache.clone(),
        EngineConfig {
            max_concurrent_targets: limit,
        },
    );
    (engine, backend, cache)
}

fn engine(backend: FakeBackend) -> (QueryEngine, Arc<FakeBackend>, Arc<EntityCache>) {
    engine_with(backend, 16)
}

fn payload() -> TargetPayload {
    TargetPayload::default()
}

fn forecast(period: Option<&str>) -> TargetPayload {
    TargetPayload {
        context: Some("prognosis".to_string()),
        period: period.map(str::to_string),
        ..Default::default()
    }
}

// =============================================================================
// Ordering and Partial Failure
// =============================================================================

#[tokio::test]
async fn test_responses_follow_target_order() {
    // Earlier targets finish last
    let mut backend = FakeBackend::new();
    let ids = ["a", "b", "c", "d", "e"];
    for (i, id) in ids.iter().enumerate() {
        backend = backend
            .with_series(id, vec![Tuple::new(1_000, i as f32)])
            .with_delay(id, Duration::from_millis(10 * (ids.len() - i) as u64));
    }
    let (engine, _, _) = engine(backend);

    let targets = ids.iter().map(|id| QueryTarget::new(*id)).collect();
    let responses = engine.execute_query(targets, range(), 100).await;

    assert_eq!(responses.len(), ids.len());
    for (i, resp) in responses.iter().enumerate() {
        assert_eq!(resp.target.as_str(), ids[i]);
        assert_eq!(resp.datapoints.len(), 1);
        assert_eq!(resp.datapoints[0].value, i as f32);
    }
}

#[tokio::test]
async fn test_failing_target_is_isolated() {
    let backend = FakeBackend::new()
        .with_series("a", vec![Tuple::new(1_000, 1.0)])
        .with_series("b", vec![Tuple::new(1_000, 2.0)])
        .with_series("d", vec![Tuple::new(1_000, 4.0)])
        .with_series("e", vec![Tuple::new(1_000, 5.0)])
        .with_failure("c");
    let (engine, _, _) = engine(backend);

    let targets = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|id| QueryTarget::new(*id))
        .collect();
    let outcomes = engine.execute(targets, range(), 100).await;

    assert_eq!(outcomes.len(), 5);
    let degraded: Vec<usize> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_degraded())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(degraded, vec![2]);

    let failed = &outcomes[2];
    assert_eq!(failed.response().target.as_str(), "c");
    assert!(failed.response().datapoints.is_empty());
    assert!(matches!(failed.cause(), Some(TargetError::Backend(_))));

    for i in [0, 1, 3, 4] {
        assert_eq!(outcomes[i].response().datapoints.len(), 1);
        assert!(outcomes[i].cause().is_none());
    }
}

#[tokio::test]
async fn test_empty_query() {
    let (engine, backend, _) = engine(FakeBackend::new());

    let responses = engine.execute_query(Vec::new(), range(), 100).await;

    assert!(responses.is_empty());
    assert!(backend.series_calls().is_empty());
}

#[tokio::test]
async fn test_all_targets_failing() {
    let backend = FakeBackend::new().with_failure("a").with_failure("b");
    let (engine, _, _) = engine(backend);

    let targets = vec![QueryTarget::new("a"), QueryTarget::new("b")];
    let responses = engine.execute_query(targets, range(), 100).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].target.as_str(), "a");
    assert_eq!(responses[1].target.as_str(), "b");
    assert!(responses.iter().all(|r| r.datapoints.is_empty()));
}

// =============================================================================
// Forecast Path
// =============================================================================

#[tokio::test]
async fn test_forecast_without_period_skips_backend() {
    let backend = FakeBackend::new().with_forecast("meter", 12.5);
    let (engine, backend, _) = engine(backend);

    let targets = vec![QueryTarget::new("meter").with_payload(forecast(None))];
    let outcomes = engine.execute(targets, range(), 100).await;

    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].is_degraded());
    assert!(outcomes[0].response().datapoints.is_empty());
    assert_eq!(backend.forecast_calls.load(Ordering::SeqCst), 0);
    assert!(backend.series_calls().is_empty());
}

#[tokio::test]
async fn test_forecast_datapoint_in_seconds() {
    let backend = FakeBackend::new().with_forecast("meter", 42.5);
    let (engine, backend, _) = engine(backend);

    let before = Utc::now().timestamp();
    let targets = vec![QueryTarget::new("meter").with_payload(forecast(Some("day")))];
    let responses = engine.execute_query(targets, range(), 100).await;
    let after = Utc::now().timestamp();

    assert_eq!(backend.forecast_calls.load(Ordering::SeqCst), 1);
    assert_eq!(responses[0].datapoints.len(), 1);
    let point = responses[0].datapoints[0];
    assert_eq!(point.value, 42.5);
    assert!(point.timestamp >= before && point.timestamp <= after);
}

#[tokio::test]
async fn test_forecast_context_is_case_insensitive() {
    let backend = FakeBackend::new().with_forecast("meter", 1.0);
    let (engine, backend, _) = engine(backend);

    let payload = TargetPayload {
        context: Some("Prognosis".to_string()),
        period: Some("month".to_string()),
        ..Default::default()
    };
    let targets = vec![QueryTarget::new("meter").with_payload(payload)];
    let responses = engine.execute_query(targets, range(), 100).await;

    assert_eq!(responses[0].datapoints.len(), 1);
    assert_eq!(backend.forecast_calls.load(Ordering::SeqCst), 1);
    assert!(backend.series_calls().is_empty());
}

#[tokio::test]
async fn test_forecast_failure_degrades() {
    let backend = FakeBackend::new().with_failure("meter");
    let (engine, _, _) = engine(backend);

    let targets = vec![QueryTarget::new("meter").with_payload(forecast(Some("year")))];
    let outcomes = engine.execute(targets, range(), 100).await;

    assert!(outcomes[0].is_degraded());
    assert!(outcomes[0].response().datapoints.is_empty());
}

// =============================================================================
// Display Names
// =============================================================================

#[tokio::test]
async fn test_display_name_precedence() {
    let backend = FakeBackend::new()
        .with_series("a", vec![Tuple::new(1_000, 1.0)])
        .with_series("b", vec![Tuple::new(1_000, 2.0)]);
    let (engine, _, cache) = engine(backend);
    cache.rebuild(&[FlatEntity::new("a", "Meter (House)")]);

    let named = TargetPayload {
        name: Some("Kitchen".to_string()),
        ..Default::default()
    };
    let blank_name = TargetPayload {
        name: Some(String::new()),
        ..Default::default()
    };
    let targets = vec![
        QueryTarget::new("a").with_payload(named),
        QueryTarget::new("a").with_payload(blank_name),
        QueryTarget::new("b"),
    ];
    let responses = engine.execute_query(targets, range(), 100).await;

    assert_eq!(responses[0].target, DisplayTarget::Override("Kitchen".to_string()));
    assert_eq!(
        responses[1].target,
        DisplayTarget::Resolved("Meter (House)".to_string())
    );
    assert_eq!(responses[2].target, DisplayTarget::Raw("b".to_string()));
}

#[tokio::test]
async fn test_degraded_target_keeps_display_name() {
    let backend = FakeBackend::new().with_failure("a").with_failure("b");
    let (engine, _, cache) = engine(backend);
    cache.rebuild(&[FlatEntity::new("b", "Heating")]);

    let named = TargetPayload {
        name: Some("Solar".to_string()),
        ..Default::default()
    };
    let targets = vec![
        QueryTarget::new("a").with_payload(named),
        QueryTarget::new("b"),
    ];
    let responses = engine.execute_query(targets, range(), 100).await;

    assert_eq!(responses[0].target.as_str(), "Solar");
    assert_eq!(responses[1].target.as_str(), "Heating");
}

#[tokio::test]
async fn test_forecast_uses_display_name() {
    let backend = FakeBackend::new().with_forecast("meter", 3.0);
    let (engine, _, cache) = engine(backend);
    cache.rebuild(&[FlatEntity::new("meter", "Main Meter")]);

    let targets = vec![QueryTarget::new("meter").with_payload(forecast(Some("day")))];
    let responses = engine.execute_query(targets, range(), 100).await;

    assert_eq!(responses[0].target.as_str(), "Main Meter");
}

// =============================================================================
// Series Options
// =============================================================================

#[tokio::test]
async fn test_series_request_parameters() {
    let backend = FakeBackend::new().with_series("a", Vec::new());
    let (engine, backend, _) = engine(backend);

    let payload = TargetPayload {
        group: Some("Day".to_string()),
        options: Some("Consumption".to_string()),
        ..Default::default()
    };
    engine
        .execute_query(vec![QueryTarget::new("a").with_payload(payload)], range(), 250)
        .await;

    let calls = backend.series_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "a");
    assert_eq!(calls[0].from, FROM_SECS);
    assert_eq!(calls[0].to, TO_SECS);
    assert_eq!(calls[0].group, "day");
    assert_eq!(calls[0].options, "consumption");
    assert_eq!(calls[0].max_points, 250);
}

#[tokio::test]
async fn test_tuples_hint_overrides_max_data_points() {
    let backend = FakeBackend::new()
        .with_series("a", Vec::new())
        .with_series("b", Vec::new());
    let (engine, backend, _) = engine(backend);

    let hinted = TargetPayload {
        tuples: Some(50),
        ..Default::default()
    };
    let non_positive = TargetPayload {
        tuples: Some(0),
        ..Default::default()
    };
    engine
        .execute_query(
            vec![
                QueryTarget::new("a").with_payload(hinted),
                QueryTarget::new("b").with_payload(non_positive),
            ],
            range(),
            800,
        )
        .await;

    let mut calls = backend.series_calls();
    calls.sort_by(|x, y| x.id.cmp(&y.id));
    assert_eq!(calls[0].max_points, 50);
    assert_eq!(calls[1].max_points, 800);
}

#[tokio::test]
async fn test_grouped_series_timestamps_rounded() {
    let ts = 1_678_888_020_123;
    let backend = FakeBackend::new()
        .with_series("a", vec![Tuple::new(ts, 1.0)])
        .with_series("b", vec![Tuple::new(ts, 1.0)]);
    let (engine, _, _) = engine(backend);

    let hourly = TargetPayload {
        group: Some("hour".to_string()),
        ..Default::default()
    };
    let responses = engine
        .execute_query(
            vec![
                QueryTarget::new("a").with_payload(hourly),
                QueryTarget::new("b").with_payload(payload()),
            ],
            range(),
            100,
        )
        .await;

    let rounded = responses[0].datapoints[0].timestamp;
    assert_eq!(rounded, round_timestamp(ts, "hour"));
    assert!(rounded <= ts && ts - rounded < 3_600_000);
    assert_eq!(rounded % 1_000, 0);

    assert_eq!(responses[1].datapoints[0].timestamp, ts);
}

#[tokio::test]
async fn test_unrounded_group_passes_through() {
    let ts = 1_678_888_020_123;
    let backend = FakeBackend::new().with_series("a", vec![Tuple::new(ts, 1.0)]);
    let (engine, _, _) = engine(backend);

    let weekly = TargetPayload {
        group: Some("week".to_string()),
        ..Default::default()
    };
    let responses = engine
        .execute_query(vec![QueryTarget::new("a").with_payload(weekly)], range(), 100)
        .await;

    assert_eq!(responses[0].datapoints[0].timestamp, ts);
}

#[tokio::test]
async fn test_wire_shape() {
    let backend = FakeBackend::new().with_series(
        "a",
        vec![Tuple::new(1_000, 1.5), Tuple::new(2_000, 2.5)],
    );
    let (engine, _, _) = engine(backend);

    let responses = engine
        .execute_query(vec![QueryTarget::new("a")], range(), 100)
        .await;

    assert_eq!(
        serde_json::to_value(&responses).unwrap(),
        json!([{ "target": "a", "datapoints": [[1.5, 1000], [2.5, 2000]] }])
    );
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrency_limit_respected() {
    let mut backend = FakeBackend::new();
    let ids: Vec<String> = (0..8).map(|i| format!("ch{}", i)).collect();
    for id in &ids {
        backend = backend
            .with_series(id, vec![Tuple::new(1_000, 1.0)])
            .with_delay(id, Duration::from_millis(20));
    }
    let (engine, backend, _) = engine_with(backend, 2);

    let targets = ids.iter().map(|id| QueryTarget::new(id.as_str())).collect();
    let responses = engine.execute_query(targets, range(), 100).await;

    assert_eq!(responses.len(), 8);
    assert!(responses.iter().all(|r| r.datapoints.len() == 1));
    let peak = backend.max_in_flight.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak in-flight targets: {}", peak);
}

#[tokio::test]
async fn test_targets_run_concurrently() {
    let mut backend = FakeBackend::new();
    for id in ["a", "b", "c", "d"] {
        backend = backend
            .with_series(id, Vec::new())
            .with_delay(id, Duration::from_millis(100));
    }
    let (engine, backend, _) = engine(backend);

    let targets = ["a", "b", "c", "d"]
        .iter()
        .map(|id| QueryTarget::new(*id))
        .collect();
    engine.execute_query(targets, range(), 100).await;

    assert!(backend.max_in_flight.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_dropped_query_aborts_targets() {
    let backend = FakeBackend::new()
        .with_series("slow", Vec::new())
        .with_delay("slow", Duration::from_millis(200));
    let (engine, backend, _) = engine(backend);

    let query = engine.execute_query(vec![QueryTarget::new("slow")], range(), 100);
    let result = tokio::time::timeout(Duration::from_millis(30), query).await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(backend.series_calls().len(), 1);
    assert_eq!(backend.completed.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Entity Cache
// =============================================================================

fn house() -> Vec<EntityTree> {
    vec![EntityTree::group(
        "g1",
        "House",
        vec![EntityTree::leaf("m1", "Meter"), EntityTree::leaf("m2", "Heater")],
    )]
}

#[tokio::test]
async fn test_cache_refresh_flattens_tree() {
    let backend = FakeBackend::new().with_entities(house());
    let (_, backend, cache) = engine(backend);

    let entities = cache.refresh(backend.as_ref()).await;

    assert_eq!(entities.len(), 2);
    assert_eq!(cache.lookup("g1"), None);
    assert_eq!(cache.lookup("m1").as_deref(), Some("Meter (House)"));
    assert_eq!(cache.lookup("m2").as_deref(), Some("Heater (House)"));
}

#[tokio::test]
async fn test_cache_refresh_failure_keeps_titles() {
    let backend = FakeBackend::new().with_entities(house());
    let (_, backend, cache) = engine(backend);
    cache.refresh(backend.as_ref()).await;

    backend.set_entities(Err("middleware down".to_string()));
    let entities = cache.refresh(backend.as_ref()).await;

    assert!(entities.is_empty());
    assert_eq!(cache.lookup("m1").as_deref(), Some("Meter (House)"));
    assert_eq!(backend.entity_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_refresh_empty_keeps_titles() {
    let backend = FakeBackend::new().with_entities(house());
    let (_, backend, cache) = engine(backend);
    cache.refresh(backend.as_ref()).await;

    backend.set_entities(Ok(Vec::new()));
    let entities = cache.refresh(backend.as_ref()).await;

    assert!(entities.is_empty());
    assert_eq!(cache.len(), 2);
}
