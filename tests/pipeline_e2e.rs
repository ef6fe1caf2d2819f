//! End-to-End Pipeline Suite
//!
//! Drives the built-in plugins the way an operator would: register them,
//! instantiate components from string-typed arguments, wire a pipeline, and
//! watch frames from the synthetic stream turn into alerts in the sinks.
//!
//! Tests cover:
//! - Full happy path into the JSONL sink, with ordering and state transitions
//! - Alert cooldown through the public stream options
//! - Subscriber failure isolation
//! - Operator-initiated stop of an unbounded pipeline

mod common;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{
    Alert, ArgMap, AsyncSubscriber, ComponentError, ComponentInstance, ComponentKind, Pipeline,
    PipelineState, StreamOptions, SubscriberError,
};

/// Instantiate one built-in component by identity.
fn built_in(kind: ComponentKind, name: &str, args: &ArgMap) -> ComponentInstance {
    let registry = common::registry_with_builtins();
    let descriptor = registry.find(kind, name).expect("descriptor").clone();
    registry.instantiate(&descriptor, args).expect("instantiate")
}

/// Moving-block test pattern sized so frame differencing fires on every
/// frame after the baseline: 64 changed pixels per step at full contrast.
fn moving_pattern(frames: u64) -> ComponentInstance {
    built_in(
        ComponentKind::AsyncVideoStream,
        "test-pattern",
        &common::arg_map(&[
            ("width", "64"),
            ("height", "64"),
            ("fps", "100"),
            ("frames", &frames.to_string()),
        ]),
    )
}

fn sensitive_detector() -> ComponentInstance {
    built_in(
        ComponentKind::SyncDetector,
        "frame-diff",
        &common::arg_map(&[("threshold", "2"), ("min_area", "32")]),
    )
}

#[tokio::test]
async fn full_pipeline_detects_motion_into_the_jsonl_sink() {
    common::init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let alerts_path = dir.path().join("alerts.jsonl");

    let jsonl = built_in(
        ComponentKind::SyncSubscriber,
        "jsonl",
        &common::arg_map(&[("path", &alerts_path.display().to_string())]),
    );
    let log = built_in(
        ComponentKind::AsyncSubscriber,
        "log",
        &common::arg_map(&[("level", "warn")]),
    );

    let mut pipeline = Pipeline::builder("front-door")
        .add_stream("front-door", moving_pattern(6))
        .expect("attach stream")
        .add_detector("motion", sensitive_detector())
        .expect("attach detector")
        .add_subscriber("journal", jsonl)
        .expect("attach jsonl sink")
        .add_subscriber("console", log)
        .expect("attach log sink")
        .build()
        .expect("build");

    let mut states = pipeline.subscribe_state();
    assert_eq!(pipeline.state(), PipelineState::Idle);

    pipeline.start().await.expect("start");
    states.changed().await.expect("state transition");
    assert_eq!(*states.borrow_and_update(), PipelineState::Running);

    let report = pipeline.join().await.expect("clean run");
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(report.frames, 6);
    // The first frame only seeds the motion baseline.
    assert_eq!(report.alerts, 5);
    assert_eq!(report.subscriber_failures, 0);
    assert!(report.termination_failures.is_empty());

    let contents = std::fs::read_to_string(&alerts_path).expect("sink file");
    let alerts: Vec<Alert> = contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("alert json"))
        .collect();
    assert_eq!(alerts.len(), 5);

    let sequences: Vec<u64> = alerts.iter().map(|alert| alert.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);

    for alert in &alerts {
        assert_eq!(alert.header, "Camera Alert");
        assert_eq!(alert.description, "Detected: motion");
        assert_eq!(alert.source, "front-door");
        assert_eq!(alert.detector, "motion");
    }
    assert!((alerts[0].frame_timestamp - 0.01).abs() < 1e-9);

    let ids: HashSet<uuid::Uuid> = alerts.iter().map(|alert| alert.id).collect();
    assert_eq!(ids.len(), alerts.len(), "alert ids must be unique");

    let stamped: Vec<chrono::DateTime<chrono::Utc>> =
        alerts.iter().map(|alert| alert.timestamp).collect();
    let mut ordered = stamped.clone();
    ordered.sort();
    assert_eq!(stamped, ordered, "alerts are stamped in dispatch order");
}

#[tokio::test]
async fn alert_cooldown_limits_dispatch_rate() {
    common::init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let alerts_path = dir.path().join("alerts.jsonl");

    let jsonl = built_in(
        ComponentKind::SyncSubscriber,
        "jsonl",
        &common::arg_map(&[("path", &alerts_path.display().to_string())]),
    );

    let options = StreamOptions {
        detect_interval: None,
        alert_cooldown: Some(600.0),
    };
    let mut pipeline = Pipeline::builder("cooldown")
        .add_stream_with("front-door", moving_pattern(6), options)
        .expect("attach stream")
        .add_detector("motion", sensitive_detector())
        .expect("attach detector")
        .add_subscriber("journal", jsonl)
        .expect("attach sink")
        .build()
        .expect("build");

    pipeline.start().await.expect("start");
    let report = pipeline.join().await.expect("clean run");

    assert_eq!(report.alerts, 1);
    assert_eq!(report.alerts_suppressed, 4);

    let contents = std::fs::read_to_string(&alerts_path).expect("sink file");
    assert_eq!(contents.lines().count(), 1);
}

/// Fails every delivery, like a webhook endpoint that is down.
struct FlakySubscriber;

#[async_trait]
impl AsyncSubscriber for FlakySubscriber {
    async fn notify(&mut self, _alert: Arc<Alert>) -> Result<(), SubscriberError> {
        Err(SubscriberError::Delivery("webhook returned 503".to_string()))
    }

    async fn clean_up(&mut self) -> Result<(), ComponentError> {
        Ok(())
    }
}

#[tokio::test]
async fn subscriber_failure_never_stops_the_pipeline() {
    common::init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let alerts_path = dir.path().join("alerts.jsonl");

    let jsonl = built_in(
        ComponentKind::SyncSubscriber,
        "jsonl",
        &common::arg_map(&[("path", &alerts_path.display().to_string())]),
    );

    let mut pipeline = Pipeline::builder("isolation")
        .add_stream("front-door", moving_pattern(6))
        .expect("attach stream")
        .add_detector("motion", sensitive_detector())
        .expect("attach detector")
        .add_subscriber(
            "webhook",
            ComponentInstance::AsyncSubscriber(Box::new(FlakySubscriber)),
        )
        .expect("attach flaky sink")
        .add_subscriber("journal", jsonl)
        .expect("attach jsonl sink")
        .build()
        .expect("build");

    pipeline.start().await.expect("start");
    let report = pipeline.join().await.expect("flaky sink is not fatal");

    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(report.alerts, 5);
    assert_eq!(report.subscriber_failures, 5);

    // Every alert still reached the healthy sink.
    let contents = std::fs::read_to_string(&alerts_path).expect("sink file");
    assert_eq!(contents.lines().count(), 5);
}

#[tokio::test]
async fn operator_stop_terminates_an_unbounded_pipeline() {
    common::init_tracing();

    let log = built_in(
        ComponentKind::AsyncSubscriber,
        "log",
        &common::arg_map(&[]),
    );
    let mut pipeline = Pipeline::builder("unbounded")
        .add_stream("front-door", moving_pattern(0))
        .expect("attach stream")
        .add_detector(
            "motion",
            built_in(ComponentKind::SyncDetector, "frame-diff", &common::arg_map(&[])),
        )
        .expect("attach detector")
        .add_subscriber("console", log)
        .expect("attach sink")
        .build()
        .expect("build");

    pipeline.start().await.expect("start");
    tokio::time::sleep(Duration::from_millis(40)).await;
    let report = pipeline.stop().await.expect("stop");

    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(report.frames > 0, "stream produced before the stop");
    assert!(report.termination_failures.is_empty());
}
