//! Alerts and the subscriber component contracts

use crate::detect::Detection;
use crate::error::{ComponentError, SubscriberError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A noteworthy event derived from a non-empty detection result.
///
/// Immutable once constructed; the dispatcher shares one alert read-only with
/// every subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier
    pub id: Uuid,

    /// Short headline, e.g. "Camera Alert"
    pub header: String,

    /// Human-readable summary of what was detected
    pub description: String,

    /// Name of the stream the triggering frame came from
    pub source: String,

    /// Name of the detector that produced the detections
    pub detector: String,

    /// Sequence number of the triggering frame within its stream
    pub sequence: u64,

    /// Media timestamp of the triggering frame, in seconds
    pub frame_timestamp: f64,

    /// Wall-clock time the alert was raised
    pub timestamp: DateTime<Utc>,

    /// The detections that triggered the alert
    pub detections: Vec<Detection>,
}

impl Alert {
    /// Build an alert from a non-empty set of detections.
    ///
    /// The description names the most likely label of each detection, e.g.
    /// `"Detected: person, car"`.
    pub fn from_detections(
        source: impl Into<String>,
        detector: impl Into<String>,
        sequence: u64,
        frame_timestamp: f64,
        detections: Vec<Detection>,
    ) -> Self {
        let objects: Vec<&str> = detections
            .iter()
            .filter_map(|d| d.best_label())
            .map(|label| label.name.as_str())
            .collect();

        Self {
            id: Uuid::new_v4(),
            header: "Camera Alert".to_string(),
            description: format!("Detected: {}", objects.join(", ")),
            source: source.into(),
            detector: detector.into(),
            sequence,
            frame_timestamp,
            timestamp: Utc::now(),
            detections,
        }
    }
}

/// A synchronous alert subscriber component.
///
/// Implementations may block (file writes, network sends); the pipeline lifts
/// them onto the blocking worker pool via [`crate::adapter::BlockingSubscriber`].
pub trait SyncSubscriber: Send {
    /// Deliver one alert. Side-effecting; must not mutate the alert.
    fn notify(&mut self, alert: &Alert) -> Result<(), SubscriberError>;

    /// Release all resources held by this component. Called exactly once by
    /// the pipeline during termination.
    fn clean_up(&mut self) -> Result<(), ComponentError>;
}

/// An asynchronous alert subscriber component.
#[async_trait]
pub trait AsyncSubscriber: Send {
    /// Deliver one alert. The alert arrives as a shared handle; every
    /// subscriber of the pipeline sees the same alert value.
    async fn notify(&mut self, alert: Arc<Alert>) -> Result<(), SubscriberError>;

    /// Release all resources held by this component. Called exactly once by
    /// the pipeline during termination.
    async fn clean_up(&mut self) -> Result<(), ComponentError>;
}
